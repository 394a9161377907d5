//! Quota and Admission Window Tracking
//!
//! This module provides the core quota type and the window tracker that
//! records admission timestamps and answers "how long until the next
//! operation is admissible".

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::ThrottleError;

/// Immutable admission quota: at most `max_operations` admissions within any
/// trailing `window`.
///
/// Both values must be strictly positive. A zero `max_operations` would
/// never admit anything and a zero window would never throttle anything, so
/// both are rejected at construction rather than discovered at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    max_operations: u32,
    window: Duration,
}

impl Quota {
    /// Create a validated quota for the named service.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Configuration`] if `max_operations` is zero
    /// or `window` is zero.
    pub fn new(
        service: &str,
        max_operations: u32,
        window: Duration,
    ) -> Result<Self, ThrottleError> {
        if max_operations == 0 {
            return Err(ThrottleError::configuration(
                service,
                "max_operations must be greater than zero",
            ));
        }
        if window.is_zero() {
            return Err(ThrottleError::configuration(
                service,
                "rate limit window must be greater than zero",
            ));
        }

        Ok(Self {
            max_operations,
            window,
        })
    }

    /// Maximum admissions per window.
    pub fn max_operations(&self) -> u32 {
        self.max_operations
    }

    /// Trailing window duration.
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Ordered record of admission timestamps for one service.
///
/// The tracker only ever holds timestamps within `[now - window, now]`;
/// older entries are pruned from the front of the deque on every call, which
/// is amortized O(1) per admission.
///
/// The tracker itself is not synchronized. It is owned by exactly one
/// [`ThrottleGate`](super::ThrottleGate), which mutates it under its lock.
#[derive(Debug)]
pub struct WindowTracker {
    quota: Quota,
    admissions: VecDeque<Instant>,
}

impl WindowTracker {
    /// Create an empty tracker for the given quota.
    pub fn new(quota: Quota) -> Self {
        Self {
            quota,
            admissions: VecDeque::with_capacity(quota.max_operations() as usize),
        }
    }

    /// The quota this tracker enforces.
    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    /// How long the caller must wait before the next admission.
    ///
    /// Zero if fewer than `max_operations` admissions fall within the
    /// trailing window; otherwise the time until the oldest in-window
    /// admission ages out. The returned wait is a lower bound only: other
    /// callers may admit in the meantime, so the caller must re-check after
    /// sleeping.
    pub fn wait_before_admission(&mut self, now: Instant) -> Duration {
        self.prune(now);

        if (self.admissions.len() as u32) < self.quota.max_operations() {
            return Duration::ZERO;
        }

        // The slot frees when the oldest admission still counted against the
        // quota leaves the window.
        let blocking_idx = self.admissions.len() - self.quota.max_operations() as usize;
        let blocking = self.admissions[blocking_idx];
        (blocking + self.quota.window()).saturating_duration_since(now)
    }

    /// Record an admission at `now`.
    pub fn record(&mut self, now: Instant) {
        self.admissions.push_back(now);
        self.prune(now);
    }

    /// Number of admissions currently inside the window.
    pub fn in_window(&self) -> usize {
        self.admissions.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.admissions.front() {
            if now.saturating_duration_since(front) >= self.quota.window() {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }
}
