//! Failure Shell and Call Outcomes
//!
//! This module wraps a throttled call with bounded, local error recovery: a
//! failed call degrades to a typed [`CallOutcome::Failure`] instead of
//! unwinding through the caller, so one bad record never aborts the rest of
//! a reporting pass.
//!
//! Transient transport failures are retried with exponential backoff and
//! jitter before giving up; configuration and invocation errors are never
//! retried. Every attempt — retried or not — consumes its own admission
//! slot, because the external quota charges for the attempt, not the
//! success.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::ThrottleError;
use crate::metrics;

/// Outcome of a shell-wrapped call.
///
/// Callers must handle both branches explicitly: a `Failure` is a sentinel
/// "no result" and is distinguishable from a legitimately empty `Success`
/// (an empty worker list, a user with zero tracked time).
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// The underlying call's native return value
    Success(T),
    /// The call failed after exhausting local recovery; carries the
    /// triggering condition
    Failure(String),
}

impl<T> CallOutcome<T> {
    /// Whether the call produced a value.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether the call degraded to the failure sentinel.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The value, if any.
    pub fn into_success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(reason) => Some(reason),
        }
    }
}

/// Recovery policy for the failure shell.
///
/// `max_attempts` counts the initial attempt; `max_attempts = 1` disables
/// retries entirely and only converts errors into the sentinel.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,

    /// Base delay before the first retry
    pub base_delay: Duration,

    /// Cap on the backoff delay
    pub max_delay: Duration,

    /// Jitter factor (0.0 to 1.0) applied to each delay, so parallel
    /// retries don't synchronize against the same window edge
    pub jitter: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: 0.1,
        }
    }
}

impl RecoveryConfig {
    /// Create the default recovery policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the base delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the cap on the backoff delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter factor, clamped to `[0.0, 1.0]`.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Backoff delay for the given (zero-based) attempt.
    ///
    /// Exponential: `base_delay * 2^attempt`, jittered, capped at
    /// `max_delay`.
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponential = self.base_delay * 2_u32.saturating_pow(attempt as u32);

        let jitter_range = exponential.mul_f64(self.jitter);
        let jitter_offset = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range.as_secs_f64();
        let jittered = exponential.saturating_add(Duration::from_secs_f64(jitter_offset.abs()));

        jittered.min(self.max_delay)
    }

    /// Whether an error is worth another attempt.
    ///
    /// Only transport-level conditions are transient. Invocation errors are
    /// programming defects and configuration errors are startup defects;
    /// retrying either would just burn quota.
    pub fn should_retry(&self, error: &anyhow::Error) -> bool {
        if let Some(throttle_err) = error.downcast_ref::<ThrottleError>() {
            return match throttle_err {
                ThrottleError::Transport(e) => reqwest_error_is_transient(e),
                ThrottleError::Configuration { .. } | ThrottleError::Invocation(_) => false,
            };
        }

        if let Some(reqwest_err) = error.downcast_ref::<reqwest::Error>() {
            return reqwest_error_is_transient(reqwest_err);
        }

        false
    }
}

fn reqwest_error_is_transient(error: &reqwest::Error) -> bool {
    if let Some(status) = error.status() {
        return should_retry_status(status.as_u16());
    }
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Whether an HTTP status code indicates a transient condition.
///
/// Retryable: 408 Request Timeout, 429 Too Many Requests, and 5xx except
/// 501 Not Implemented and 505 HTTP Version Not Supported.
pub fn should_retry_status(status: u16) -> bool {
    match status {
        408 | 429 => true,
        500..=599 => status != 501 && status != 505,
        _ => false,
    }
}

/// Run an operation under the failure shell.
///
/// On success the value is returned as [`CallOutcome::Success`] — including
/// empty collections, which remain distinguishable from failure. On error,
/// transient conditions are retried up to `config.max_attempts` with
/// backoff; once exhausted (or immediately, for non-transient errors) the
/// condition is logged and the sentinel [`CallOutcome::Failure`] returned.
///
/// The operation closure is re-invoked per attempt, so each attempt goes
/// back through the throttle gate it wraps.
pub async fn run_recovering<F, Fut, T>(
    service: &str,
    config: &RecoveryConfig,
    mut operation: F,
) -> CallOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failed = 0usize;

    loop {
        match operation().await {
            Ok(value) => {
                if failed > 0 {
                    tracing::info!(
                        service,
                        attempt = failed + 1,
                        "Call succeeded after retrying"
                    );
                }
                return CallOutcome::Success(value);
            }
            Err(e) => {
                failed += 1;
                if failed < config.max_attempts && config.should_retry(&e) {
                    let delay = config.backoff_delay(failed - 1);
                    tracing::warn!(
                        service,
                        attempt = failed,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Call failed, retrying after backoff"
                    );
                    metrics::CALL_RETRIES_TOTAL.with_label_values(&[service]).inc();
                    sleep(delay).await;
                } else {
                    return fail(service, e);
                }
            }
        }
    }
}

fn fail<T>(service: &str, error: anyhow::Error) -> CallOutcome<T> {
    let kind = classify(&error);
    tracing::error!(service, kind, error = %error, "Call failed, returning failure sentinel");
    metrics::CALL_FAILURES_TOTAL
        .with_label_values(&[service, kind])
        .inc();
    CallOutcome::Failure(error.to_string())
}

fn classify(error: &anyhow::Error) -> &'static str {
    match error.downcast_ref::<ThrottleError>() {
        Some(ThrottleError::Transport(_)) => "transport",
        Some(ThrottleError::Invocation(_)) => "invocation",
        Some(ThrottleError::Configuration { .. }) => "configuration",
        None if error.downcast_ref::<reqwest::Error>().is_some() => "transport",
        None => "other",
    }
}
