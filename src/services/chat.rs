//! Chat Notification Client
//!
//! Posts plain-text alerts to a channel. The chat API tolerates far more
//! traffic than this job produces, but it calls through the same gate
//! abstraction as everything else so a misconfigured loop can never spam
//! it.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::error::ThrottleError;
use crate::throttle::Throttler;

/// Acknowledgement for a posted message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageReceipt {
    /// Channel the message landed in
    pub channel: String,
    /// Service-assigned message timestamp/id
    pub ts: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the chat notification API.
#[derive(Debug, Clone)]
pub struct ChatClient {
    throttler: Throttler,
    http: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    /// Create a client calling through the given throttle handle.
    pub fn new(throttler: Throttler, config: ChatConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            throttler,
            http,
            config,
        }
    }

    /// Post a plain-text message to a channel.
    ///
    /// The API reports application-level rejections in-band with a 200
    /// status; those surface as [`ThrottleError::Invocation`], since they
    /// mean the request itself was wrong and retrying is pointless.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<MessageReceipt> {
        let url = format!("{}/chat.postMessage", self.config.base_url);
        let body = json!({
            "channel": channel,
            "text": text,
        });

        let response = self
            .throttler
            .execute(|| async move {
                self.http
                    .post(&url)
                    .bearer_auth(&self.config.token)
                    .json(&body)
                    .send()
                    .await
            })
            .await
            .map_err(ThrottleError::Transport)?
            .error_for_status()
            .map_err(ThrottleError::Transport)?;

        let payload: PostMessageResponse = response
            .json()
            .await
            .map_err(ThrottleError::Transport)
            .context("Failed to decode chat post response")?;

        if !payload.ok {
            let reason = payload.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(ThrottleError::Invocation(format!(
                "chat API rejected the message: {}",
                reason
            ))
            .into());
        }

        Ok(MessageReceipt {
            channel: channel.to_string(),
            ts: payload.ts.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_message_response_ok() {
        let parsed: PostMessageResponse =
            serde_json::from_str(r#"{"ok": true, "ts": "1724668800.000100"}"#).unwrap();
        assert!(parsed.ok);
        assert_eq!(parsed.ts.as_deref(), Some("1724668800.000100"));
    }

    #[test]
    fn test_post_message_response_error() {
        let parsed: PostMessageResponse =
            serde_json::from_str(r#"{"ok": false, "error": "channel_not_found"}"#).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error.as_deref(), Some("channel_not_found"));
    }
}
