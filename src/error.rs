//! Error Types
//!
//! This module defines the error taxonomy for the throttled execution core
//! and the API clients built on top of it.
//!
//! Propagation policy:
//!
//! - [`ThrottleError::Configuration`] is fatal at startup. An invalid quota
//!   must abort the process rather than silently disable throttling.
//! - [`ThrottleError::Transport`] is recovered locally by the failure shell
//!   and surfaced to callers as a sentinel `Failure` outcome.
//! - [`ThrottleError::Invocation`] indicates a programming error (malformed
//!   request or unexpected response shape) and is propagated immediately,
//!   never retried.

/// Error types for the throttle core and service clients
#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    /// Invalid quota or service configuration
    #[error("Invalid configuration for '{service}': {reason}")]
    Configuration {
        /// Service the quota belongs to
        service: String,
        /// What was wrong with it
        reason: String,
    },

    /// Underlying HTTP call failed (network, auth, 4xx/5xx)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed request or unexpected response shape
    #[error("Invocation error: {0}")]
    Invocation(String),
}

impl ThrottleError {
    /// Build a configuration error for a named service.
    pub fn configuration(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure shell may retry this error.
    ///
    /// Transport failures are transient by default; configuration and
    /// invocation errors never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
