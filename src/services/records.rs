//! Worker Record Store Client
//!
//! Fetches the active worker roster from the record store, following the
//! store's offset-cursor pagination. Every page fetch is a separate
//! throttled operation, routed through the shared `records` handle via
//! [`Throttler::execute`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::config::RecordStoreConfig;
use crate::error::ThrottleError;
use crate::throttle::Throttler;

/// One worker record as returned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerRecord {
    /// Store-assigned record id
    pub id: String,
    /// Field bag for the record
    #[serde(default)]
    pub fields: WorkerFields,
}

/// The record fields the report consumes.
///
/// Field names mirror the store's column labels; list-valued columns stay
/// lists here and are flattened by the accessors below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerFields {
    #[serde(rename = "Worker")]
    pub name: Option<String>,

    #[serde(rename = "Work Email Address", default)]
    pub work_email: Vec<String>,

    #[serde(rename = "Current Position Title", default)]
    pub position_title: Vec<String>,

    #[serde(rename = "Current Position Level", default)]
    pub position_level: Vec<String>,

    #[serde(rename = "Manager Name", default)]
    pub manager: Vec<String>,

    #[serde(rename = "Manager Chat Member ID", default)]
    pub manager_chat_id: Vec<String>,

    #[serde(rename = "Director Name", default)]
    pub director: Vec<String>,

    #[serde(rename = "Director Chat Member ID", default)]
    pub director_chat_id: Vec<String>,
}

impl WorkerFields {
    /// Primary work email, if the record has one.
    pub fn email(&self) -> Option<&str> {
        self.work_email.first().map(String::as_str)
    }

    /// Manager's name, falling back to the director.
    pub fn manager_or_director(&self) -> Option<&str> {
        self.manager
            .first()
            .or_else(|| self.director.first())
            .map(String::as_str)
    }

    /// Manager's chat id, falling back to the director's.
    pub fn manager_chat_id(&self) -> Option<&str> {
        self.manager_chat_id
            .first()
            .or_else(|| self.director_chat_id.first())
            .map(String::as_str)
    }

    /// Position title, if set.
    pub fn title(&self) -> Option<&str> {
        self.position_title.first().map(String::as_str)
    }

    /// Position level, if set.
    pub fn level(&self) -> Option<&str> {
        self.position_level.first().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<WorkerRecord>,
    /// Cursor for the next page; absent on the last page
    offset: Option<String>,
}

/// Client for the worker record store.
#[derive(Debug, Clone)]
pub struct RecordStoreClient {
    throttler: Throttler,
    http: reqwest::Client,
    config: RecordStoreConfig,
}

impl RecordStoreClient {
    /// Create a client calling through the given throttle handle.
    pub fn new(throttler: Throttler, config: RecordStoreConfig) -> Self {
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

    /// Fetch the full active worker roster, page by page.
    ///
    /// Each page fetch consumes one admission slot. An empty roster is a
    /// legitimate result and is returned as an empty vector.
    pub async fn list_workers(&self) -> Result<Vec<WorkerRecord>> {
        let url = format!("{}/{}", self.config.base_url, self.config.table);
        let mut workers = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.fetch_page(&url, offset.as_deref()).await?;
            workers.extend(page.records);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        tracing::debug!(count = workers.len(), "Fetched worker roster");
        Ok(workers)
    }

    async fn fetch_page(&self, url: &str, offset: Option<&str>) -> Result<RecordPage> {
        let mut params: Vec<(&str, &str)> = vec![("view", &self.config.view)];
        if let Some(cursor) = offset {
            params.push(("offset", cursor));
        }

        let response = self
            .throttler
            .execute(|| async move {
                self.http
                    .get(url)
                    .bearer_auth(&self.config.api_key)
                    .query(&params)
                    .send()
                    .await
            })
            .await
            .map_err(ThrottleError::Transport)?;

        let response = response
            .error_for_status()
            .map_err(ThrottleError::Transport)?;

        let page: RecordPage = response
            .json()
            .await
            .map_err(ThrottleError::Transport)
            .context("Failed to decode worker record page")?;

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_page_decodes_store_payload() {
        let payload = r#"{
            "records": [
                {
                    "id": "rec123",
                    "fields": {
                        "Worker": "Ada Lovelace",
                        "Work Email Address": ["ada@example.com"],
                        "Current Position Title": ["Engineer"],
                        "Manager Name": ["Grace Hopper"],
                        "Manager Chat Member ID": ["U0123"]
                    }
                }
            ],
            "offset": "itr456"
        }"#;

        let page: RecordPage = serde_json::from_str(payload).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.offset.as_deref(), Some("itr456"));

        let fields = &page.records[0].fields;
        assert_eq!(fields.email(), Some("ada@example.com"));
        assert_eq!(fields.manager_or_director(), Some("Grace Hopper"));
        assert_eq!(fields.manager_chat_id(), Some("U0123"));
    }

    #[test]
    fn test_last_page_has_no_offset() {
        let page: RecordPage = serde_json::from_str(r#"{"records": []}"#).unwrap();
        assert!(page.records.is_empty());
        assert!(page.offset.is_none());
    }

    #[test]
    fn test_manager_falls_back_to_director() {
        let fields: WorkerFields = serde_json::from_str(
            r#"{
                "Director Name": ["Margaret Hamilton"],
                "Director Chat Member ID": ["U0456"]
            }"#,
        )
        .unwrap();

        assert_eq!(fields.manager_or_director(), Some("Margaret Hamilton"));
        assert_eq!(fields.manager_chat_id(), Some("U0456"));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let record: WorkerRecord = serde_json::from_str(r#"{"id": "rec1"}"#).unwrap();
        assert!(record.fields.email().is_none());
        assert!(record.fields.manager_chat_id().is_none());
    }
}
