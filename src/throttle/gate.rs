//! Blocking Admission Gate
//!
//! The gate is the concurrency-control primitive of the throttle core:
//! callers ask for permission to perform one operation and are delayed,
//! never denied, until the service's window has capacity.

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

use super::window::{Quota, WindowTracker};
use crate::metrics;

/// Admission gate for one external service.
///
/// Safe to share between any number of concurrent tasks: the
/// check-then-record sequence runs under a mutex, so two callers can never
/// both pass a full window. The wait itself happens with the lock released
/// and the computed delay is only a hint — after waking, the gate re-checks,
/// because other callers may have taken the freed slot in the meantime.
///
/// There is deliberately no timeout or cancellation path through
/// [`acquire`](Self::acquire): quotas are always satisfiable eventually, and
/// the sole suspension point is the sleep between re-checks.
#[derive(Debug)]
pub struct ThrottleGate {
    service: String,
    quota: Quota,
    tracker: Mutex<WindowTracker>,
}

impl ThrottleGate {
    /// Create a gate for the named service with the given quota.
    pub fn new(service: impl Into<String>, quota: Quota) -> Self {
        Self {
            service: service.into(),
            quota,
            tracker: Mutex::new(WindowTracker::new(quota)),
        }
    }

    /// Service this gate protects.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The quota this gate enforces.
    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Block (asynchronously) until one admission slot is free, then consume
    /// it.
    ///
    /// The downstream operation must run *after* this returns and outside
    /// any lock; the admission is charged for the attempt, whether or not
    /// the operation later succeeds.
    pub async fn acquire(&self) {
        let started = Instant::now();

        loop {
            let wait = {
                let mut tracker = self.tracker.lock().await;
                let now = Instant::now();
                let wait = tracker.wait_before_admission(now);

                if wait.is_zero() {
                    tracker.record(now);
                    drop(tracker);

                    metrics::THROTTLE_ADMISSIONS_TOTAL
                        .with_label_values(&[&self.service])
                        .inc();
                    metrics::THROTTLE_WAIT_SECONDS
                        .with_label_values(&[&self.service])
                        .observe(started.elapsed().as_secs_f64());
                    return;
                }

                wait
            };

            trace!(
                service = %self.service,
                wait_ms = wait.as_millis() as u64,
                "Throttle window full, waiting for admission"
            );
            sleep(wait).await;
        }
    }

    /// Number of admissions currently counted against the window.
    ///
    /// Snapshot for observability and tests; stale by the time it returns.
    pub async fn in_window(&self) -> usize {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();
        // Prune via the wait computation so expired admissions don't count.
        let _ = tracker.wait_before_admission(now);
        tracker.in_window()
    }
}
