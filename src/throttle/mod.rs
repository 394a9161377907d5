//! Throttled Execution Core
//!
//! This module provides the rate-limited execution primitive that every
//! outbound API call in the job goes through. Each external service gets its
//! own admission domain: a quota (max operations per trailing window), a
//! window of recorded admission timestamps, and a blocking gate in front of
//! the actual call.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Throttler (per service)               │
//! ├──────────────────────────────────────────────────────────┤
//! │  execute(op)          throttled_get(url, params)          │
//! │        │                        │                         │
//! │        └────────┬───────────────┘                         │
//! │                 ▼                                         │
//! │          ThrottleGate::acquire()   (delays, never denies) │
//! │                 │                                         │
//! │                 ▼                                         │
//! │          WindowTracker             (admission timestamps) │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Admission bookkeeping happens under the gate's lock; the downstream call
//! runs unlocked so a slow response never stalls other admission checks.
//!
//! The counting policy is a fixed look-back window over recorded admission
//! timestamps, not a token bucket: a slot frees exactly when the oldest
//! in-window admission ages out. The two are not equivalent under bursty
//! arrival, and the look-back window is the contract the external services
//! are rate-limited against.

pub mod adapter;
pub mod gate;
pub mod outcome;
pub mod window;

pub use adapter::Throttler;
pub use gate::ThrottleGate;
pub use outcome::{run_recovering, CallOutcome, RecoveryConfig};
pub use window::{Quota, WindowTracker};
