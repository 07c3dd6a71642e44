//! Network resilience for Breakwater
//!
//! This crate implements the recovery side of the resilience layer:
//! deterministic failure classification, bounded retries with linear and
//! exponential backoff, cached-data fallbacks, an offline replay queue and
//! a capacity-bounded diagnostics log.

pub mod classify;
pub mod engine;
pub mod error_log;
pub mod offline_queue;
pub mod retry;
pub mod state_store;

pub use classify::{classify, FailureClass};
pub use engine::{RecoveryEngine, RecoveryOutcome};
pub use error_log::{ErrorLog, ErrorRecord, Severity};
pub use offline_queue::{OfflineQueue, OfflineQueueConfig, QueueStats, QueuedRequest};
pub use retry::{BackoffKind, RetryLedger, RetryPolicy, RetryRecord};
pub use state_store::{InMemoryStateStore, StateStore, StateStoreError};
