//! Idlewatch Library
//!
//! This library provides the core functionality for the idlewatch reporting
//! job: a rate-limited execution core (per-service admission gates, a
//! uniform call adapter and a local failure shell) plus thin clients for
//! the worker record store, the time-tracking API and the chat API.

pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod services;
pub mod throttle;
