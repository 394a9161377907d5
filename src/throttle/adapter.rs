//! Uniform Invocation Wrapper
//!
//! A [`Throttler`] is the per-service handle the rest of the job calls
//! through. It funnels two call shapes through one admission gate:
//!
//! - [`execute`](Throttler::execute): an arbitrary deferred operation,
//!   expressed as a closure returning a future. What used to be "invoke this
//!   named method on that SDK object" becomes a narrow capability the
//!   throttle core stays agnostic of.
//! - [`throttled_get`](Throttler::throttled_get): a plain HTTP GET with
//!   query parameters, for services driven directly over REST.
//!
//! In both cases the throttling is transparent: results, HTTP statuses and
//! errors of the underlying call propagate unchanged.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::gate::ThrottleGate;
use super::window::Quota;

/// Default timeout for HTTP calls made through [`Throttler::throttled_get`].
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Long-lived, named throttle handle for one external service.
///
/// Created once at process start by the composition root and shared
/// (`Arc`-cloned) across every call site targeting that service. Handles are
/// independent: exhausting one service's quota never delays another's.
#[derive(Debug, Clone)]
pub struct Throttler {
    gate: Arc<ThrottleGate>,
    http: reqwest::Client,
}

impl Throttler {
    /// Create a throttle handle for the named service.
    pub fn new(service: impl Into<String>, quota: Quota) -> Self {
        // Matches the transport layer: a client build failure is a startup
        // defect, not a runtime condition.
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            gate: Arc::new(ThrottleGate::new(service, quota)),
            http,
        }
    }

    /// Create a handle with a custom HTTP timeout.
    pub fn with_timeout(service: impl Into<String>, quota: Quota, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            gate: Arc::new(ThrottleGate::new(service, quota)),
            http,
        }
    }

    /// Service this handle throttles.
    pub fn service(&self) -> &str {
        self.gate.service()
    }

    /// The admission gate behind this handle.
    pub fn gate(&self) -> &ThrottleGate {
        &self.gate
    }

    /// Run an arbitrary operation once an admission slot is granted.
    ///
    /// The operation is deferred: it is only constructed into a future after
    /// the gate admits the caller, and it runs outside the gate's lock. Its
    /// output — success or failure — is returned unchanged; the throttling
    /// layer never swallows business-logic errors.
    pub async fn execute<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.gate.acquire().await;
        op().await
    }

    /// Perform an HTTP GET once an admission slot is granted.
    ///
    /// Returns the raw [`reqwest::Response`]; non-2xx statuses are not
    /// treated as errors here, and transport errors propagate unmodified.
    pub async fn throttled_get<P>(&self, url: &str, params: &P) -> reqwest::Result<reqwest::Response>
    where
        P: Serialize + ?Sized,
    {
        self.gate.acquire().await;
        self.http.get(url).query(params).send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn throttler(max_operations: u32, window_ms: u64) -> Throttler {
        let quota =
            Quota::new("test", max_operations, Duration::from_millis(window_ms)).unwrap();
        Throttler::new("test", quota)
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_returns_value_unchanged() {
        let throttler = throttler(5, 1000);

        let value = throttler.execute(|| async { 42 }).await;
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_propagates_errors_unchanged() {
        let throttler = throttler(5, 1000);

        let result: anyhow::Result<()> = throttler
            .execute(|| async { Err(anyhow::anyhow!("upstream rejected the call")) })
            .await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "upstream rejected the call"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_is_throttled() {
        let throttler = throttler(2, 1000);
        let start = Instant::now();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let calls = &calls;
            throttler
                .execute(move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_runs_after_admission_is_recorded() {
        let throttler = throttler(5, 1000);

        throttler.execute(|| async {}).await;
        assert_eq!(throttler.gate().in_window().await, 1);
    }
}
