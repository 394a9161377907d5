//! External Service Clients
//!
//! Thin clients for the three external dependencies of the reporting job —
//! the worker record store, the time-tracking API and the chat API — each
//! calling out through its own throttle handle.
//!
//! The handles live in [`ServiceThrottles`], built once by the composition
//! root from configuration and injected into the clients. There is no
//! global throttler state: "one throttler per service, shared across call
//! sites" falls out of `Arc`-cloning the same handle into every client that
//! targets that service.

pub mod chat;
pub mod records;
pub mod timetrack;

pub use chat::ChatClient;
pub use records::RecordStoreClient;
pub use timetrack::TimeTrackClient;

use crate::config::ThrottleConfig;
use crate::error::ThrottleError;
use crate::throttle::Throttler;

/// One throttle handle per external dependency.
///
/// Handles are closed admission domains: exhausting the record store's
/// quota never delays a time-tracking or chat call.
#[derive(Debug, Clone)]
pub struct ServiceThrottles {
    /// Worker record store (paginated list fetches)
    pub records: Throttler,
    /// Time-tracking API (user lookup, usage statistics)
    pub timetrack: Throttler,
    /// Chat notification API (message posts)
    pub chat: Throttler,
}

impl ServiceThrottles {
    /// Build all handles from validated throttle configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Configuration`] if any service's quota is
    /// invalid; the process must not start with throttling silently
    /// disabled.
    pub fn from_config(config: &ThrottleConfig) -> Result<Self, ThrottleError> {
        Ok(Self {
            records: Throttler::new("records", config.records.to_quota("records")?),
            timetrack: Throttler::new("timetrack", config.timetrack.to_quota("timetrack")?),
            chat: Throttler::new("chat", config.chat.to_quota("chat")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotaSettings;

    #[test]
    fn test_from_config_builds_named_handles() {
        let throttles = ServiceThrottles::from_config(&ThrottleConfig::default()).unwrap();

        assert_eq!(throttles.records.service(), "records");
        assert_eq!(throttles.timetrack.service(), "timetrack");
        assert_eq!(throttles.chat.service(), "chat");
    }

    #[test]
    fn test_invalid_quota_is_fatal() {
        let config = ThrottleConfig {
            records: QuotaSettings {
                max_operations: 0,
                window_secs: 1.0,
            },
            ..ThrottleConfig::default()
        };

        let err = ServiceThrottles::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("records"));
    }
}
