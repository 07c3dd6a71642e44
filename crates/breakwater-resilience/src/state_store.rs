//! Key/value persistence seam for resilience components.
//!
//! The host decides where diagnostic state actually lives (browser local
//! storage, a file, nothing); components only see this minimal interface.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from state persistence
#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("state store error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal persistence interface for component state snapshots.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get persisted state for a component
    async fn get_state(&self, component_id: &str) -> Result<Option<Value>, StateStoreError>;

    /// Persist state for a component
    async fn set_state(&self, component_id: &str, state: Value) -> Result<(), StateStoreError>;
}

/// StateStore implementation backed by a process-local map
///
/// Useful for tests and for hosts without durable storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    state: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_state(&self, component_id: &str) -> Result<Option<Value>, StateStoreError> {
        let state = self.state.read().await;
        Ok(state.get(component_id).cloned())
    }

    async fn set_state(&self, component_id: &str, state: Value) -> Result<(), StateStoreError> {
        let mut store = self.state.write().await;
        store.insert(component_id.to_string(), state);
        Ok(())
    }
}
