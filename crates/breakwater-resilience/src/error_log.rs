//! Bounded diagnostics log of classified failures.
//!
//! Records are append-only and ring-bounded; the log feeds diagnostics
//! exports only and never drives recovery decisions.

use crate::state_store::{StateStore, StateStoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const STATE_KEY: &str = "error_log";

/// How serious a recorded failure was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One classified failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    /// Classified category label (e.g. "server_error")
    pub kind: String,
    pub url: String,
    /// Identifier of the affected resource, when one exists
    pub resource_id: Option<String>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(kind: impl Into<String>, url: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            url: url.into(),
            resource_id: None,
            severity,
            timestamp: Utc::now(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

/// Capacity-bounded error log persisted through a [`StateStore`].
///
/// Appends never fail the caller; persistence problems are logged and
/// swallowed.
#[derive(Clone)]
pub struct ErrorLog {
    capacity: usize,
    records: Arc<Mutex<VecDeque<ErrorRecord>>>,
    store: Arc<dyn StateStore>,
}

impl ErrorLog {
    pub fn new(capacity: usize, store: Arc<dyn StateStore>) -> Self {
        Self {
            capacity,
            records: Arc::new(Mutex::new(VecDeque::new())),
            store,
        }
    }

    /// Reload previously persisted records.
    pub async fn load(&self) -> Result<(), StateStoreError> {
        if let Some(stored) = self.store.get_state(STATE_KEY).await? {
            let mut records = self.records.lock().await;
            records.clear();

            if let Some(items) = stored["records"].as_array() {
                for item in items {
                    if let Ok(record) = serde_json::from_value::<ErrorRecord>(item.clone()) {
                        records.push_back(record);
                    }
                }
            }
            while records.len() > self.capacity {
                records.pop_front();
            }
            debug!("loaded {} persisted error record(s)", records.len());
        }
        Ok(())
    }

    /// Append a record, evicting the oldest past capacity.
    pub async fn record(&self, record: ErrorRecord) {
        let snapshot = {
            let mut records = self.records.lock().await;
            if records.len() >= self.capacity {
                records.pop_front();
            }
            records.push_back(record);
            records.iter().cloned().collect::<Vec<_>>()
        };

        if let Err(e) = self
            .store
            .set_state(STATE_KEY, json!({ "records": snapshot }))
            .await
        {
            warn!("failed to persist error log: {}", e);
        }
    }

    /// Export the current records, oldest first.
    pub async fn export(&self) -> Vec<ErrorRecord> {
        self.records.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let log = ErrorLog::new(3, Arc::new(InMemoryStateStore::new()));
        for i in 0..5 {
            log.record(ErrorRecord::new(
                "network_error",
                format!("https://g.example/{}", i),
                Severity::Warning,
            ))
            .await;
        }

        let records = log.export().await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].url, "https://g.example/2");
        assert_eq!(records[2].url, "https://g.example/4");
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let store = Arc::new(InMemoryStateStore::new());
        let log = ErrorLog::new(10, store.clone());
        log.record(
            ErrorRecord::new("timeout", "https://g.example/games.json", Severity::Critical)
                .with_resource_id("games"),
        )
        .await;

        // a fresh log over the same store sees the persisted records
        let reloaded = ErrorLog::new(10, store);
        reloaded.load().await.unwrap();
        let records = reloaded.export().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "timeout");
        assert_eq!(records[0].resource_id.as_deref(), Some("games"));
    }

    #[tokio::test]
    async fn test_reload_respects_capacity() {
        let store = Arc::new(InMemoryStateStore::new());
        let log = ErrorLog::new(10, store.clone());
        for i in 0..6 {
            log.record(ErrorRecord::new(
                "network_error",
                format!("https://g.example/{}", i),
                Severity::Info,
            ))
            .await;
        }

        let smaller = ErrorLog::new(2, store);
        smaller.load().await.unwrap();
        let records = smaller.export().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].url, "https://g.example/5");
    }
}
