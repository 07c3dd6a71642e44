//! Retry policy and per-key retry bookkeeping.

use breakwater_core::ResourceKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Backoff growth applied between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `base * attempt`
    Linear,
    /// `base * 2^(attempt-1)`
    Exponential,
}

/// Retry policy shared by timeout and server-error recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts per request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between retries in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based).
    pub fn delay_for(&self, kind: BackoffKind, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let millis = match kind {
            BackoffKind::Linear => self.base_delay_ms.saturating_mul(attempt as u64),
            BackoffKind::Exponential => self
                .base_delay_ms
                .saturating_mul(2_u64.saturating_pow(attempt - 1)),
        };
        Duration::from_millis(millis)
    }
}

/// Bookkeeping for one request identity under retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryRecord {
    pub attempts: u32,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
}

/// Ledger of in-flight retry records, keyed by request identity.
///
/// Records are created on first failure, incremented per retry, and removed
/// on success or exhaustion.
#[derive(Debug, Clone, Default)]
pub struct RetryLedger {
    records: Arc<Mutex<HashMap<ResourceKey, RetryRecord>>>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed attempt; returns the failure count so far (1-based).
    pub async fn record_failure(&self, key: &ResourceKey) -> u32 {
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let record = records.entry(key.clone()).or_insert_with(|| RetryRecord {
            attempts: 0,
            first_attempt_at: now,
            last_attempt_at: now,
        });
        record.attempts += 1;
        record.last_attempt_at = now;
        debug!("failure {} recorded for {}", record.attempts, key);
        record.attempts
    }

    /// Current failure count for a key
    pub async fn attempts(&self, key: &ResourceKey) -> u32 {
        self.records
            .lock()
            .await
            .get(key)
            .map(|r| r.attempts)
            .unwrap_or(0)
    }

    /// Drop the record for a key; returns whether one existed
    pub async fn clear(&self, key: &ResourceKey) -> bool {
        self.records.lock().await.remove(key).is_some()
    }

    /// Number of keys currently under retry
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}
