//! Time-Tracking API Client
//!
//! Looks up tracked users by email and pulls summary usage statistics over
//! a date range. Both endpoints are plain GETs, so they go through
//! [`Throttler::throttled_get`] and respect the service's published rate
//! limit.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::TimeTrackConfig;
use crate::error::ThrottleError;
use crate::throttle::Throttler;

/// A tracked user as resolved from a work email.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    /// Time-tracking user id
    pub id: String,
}

/// Summary usage statistics for one user over a date range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSummary {
    /// Fraction of tracked time spent idle, in `[0, 1]`
    pub idle_ratio: f64,
    /// Total tracked time in seconds
    pub total_seconds: f64,
}

impl UsageSummary {
    /// Idle time as a percentage.
    pub fn idle_percent(&self) -> f64 {
        self.idle_ratio * 100.0
    }

    /// Total tracked time in hours.
    pub fn total_hours(&self) -> f64 {
        self.total_seconds / 3600.0
    }
}

#[derive(Debug, Deserialize)]
struct UserListResponse {
    #[serde(default)]
    data: Vec<UserPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    data: StatsData,
}

#[derive(Debug, Deserialize)]
struct StatsData {
    #[serde(default)]
    users: Vec<UserStats>,
}

#[derive(Debug, Deserialize)]
struct UserStats {
    #[serde(rename = "idleMinsRatio")]
    idle_mins_ratio: f64,
    total: f64,
}

/// Client for the time-tracking API.
#[derive(Debug, Clone)]
pub struct TimeTrackClient {
    throttler: Throttler,
    config: TimeTrackConfig,
}

impl TimeTrackClient {
    /// Create a client calling through the given throttle handle.
    pub fn new(throttler: Throttler, config: TimeTrackConfig) -> Self {
        Self { throttler, config }
    }

    /// Resolve a work email to a tracked user.
    ///
    /// Returns `Ok(None)` when the service knows no such user — a
    /// legitimate outcome, distinct from a transport failure.
    pub async fn find_user(&self, email: &str) -> Result<Option<UserProfile>> {
        let url = format!("{}/api/1.0/users", self.config.base_url);
        let params = [
            ("company", self.config.company.as_str()),
            ("filter[email]", email),
        ];

        let response = self
            .throttler
            .throttled_get(&url, &params)
            .await
            .map_err(ThrottleError::Transport)?
            .error_for_status()
            .map_err(ThrottleError::Transport)?;

        let payload: UserListResponse = response
            .json()
            .await
            .map_err(ThrottleError::Transport)
            .context("Failed to decode user lookup response")?;

        let Some(user) = payload.data.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(UserProfile { id: user.id }))
    }

    /// Pull the idle/total summary for a user over `[from, to]` (inclusive
    /// dates, whole days).
    pub async fn usage_summary(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<UsageSummary> {
        let url = format!("{}/api/1.0/stats/summary-ratio", self.config.base_url);
        let from_param = format!("{}T00:00:00Z", from.format("%Y-%m-%d"));
        let to_param = format!("{}T23:59:59Z", to.format("%Y-%m-%d"));
        let params = [
            ("company", self.config.company.as_str()),
            ("user", user_id),
            ("from", from_param.as_str()),
            ("to", to_param.as_str()),
        ];

        let response = self
            .throttler
            .throttled_get(&url, &params)
            .await
            .map_err(ThrottleError::Transport)?
            .error_for_status()
            .map_err(ThrottleError::Transport)?;

        let payload: StatsResponse = response
            .json()
            .await
            .map_err(ThrottleError::Transport)
            .context("Failed to decode usage summary response")?;

        let stats = payload.data.users.into_iter().next().ok_or_else(|| {
            ThrottleError::Invocation(format!(
                "usage summary response contained no users for '{}'",
                user_id
            ))
        })?;

        Ok(UsageSummary {
            idle_ratio: stats.idle_mins_ratio,
            total_seconds: stats.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_list_response_decodes() {
        // Unmodelled payload fields are ignored by the decoder.
        let payload = r#"{
            "data": [
                {
                    "id": "usr1",
                    "lastSeen": {"updatedAt": "2026-08-20T08:12:00Z"},
                    "hiredAt": "2024-02-01T00:00:00Z"
                }
            ]
        }"#;

        let parsed: UserListResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].id, "usr1");
    }

    #[test]
    fn test_empty_user_list_decodes() {
        let parsed: UserListResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn test_stats_response_decodes() {
        let payload = r#"{
            "data": {
                "users": [
                    {"idleMinsRatio": 0.182, "total": 144000.0}
                ]
            }
        }"#;

        let parsed: StatsResponse = serde_json::from_str(payload).unwrap();
        let stats = &parsed.data.users[0];
        assert!((stats.idle_mins_ratio - 0.182).abs() < f64::EPSILON);
        assert!((stats.total - 144000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_usage_summary_conversions() {
        let summary = UsageSummary {
            idle_ratio: 0.25,
            total_seconds: 7200.0,
        };

        assert!((summary.idle_percent() - 25.0).abs() < f64::EPSILON);
        assert!((summary.total_hours() - 2.0).abs() < f64::EPSILON);
    }
}
