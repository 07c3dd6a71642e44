//! Host control messages for the cache engine.

use crate::{CacheEngine, CacheResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Messages the host can send to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Promote the engine's generation immediately
    SkipWaiting,
    /// Report the current generation and its contents
    GetCacheInfo,
    /// Delete every generation
    ClearCache,
}

/// Replies to control messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlResponse {
    Activated {
        generation: String,
        removed_generations: usize,
    },
    CacheInfo {
        generation: String,
        entry_count: usize,
        keys: Vec<String>,
    },
    CacheCleared {
        success: bool,
    },
}

impl CacheEngine {
    /// Handle a host control message.
    pub async fn handle_control(&self, message: ControlMessage) -> CacheResult<ControlResponse> {
        match message {
            ControlMessage::SkipWaiting => {
                info!("skip-waiting requested, activating {}", self.generation());
                let removed = self.activate().await?;
                Ok(ControlResponse::Activated {
                    generation: self.generation().to_string(),
                    removed_generations: removed,
                })
            }
            ControlMessage::GetCacheInfo => {
                let keys = self.store().list_keys(self.generation()).await?;
                Ok(ControlResponse::CacheInfo {
                    generation: self.generation().to_string(),
                    entry_count: keys.len(),
                    keys: keys.iter().map(|k| k.to_string()).collect(),
                })
            }
            ControlMessage::ClearCache => match self.clear_all().await {
                Ok(_) => Ok(ControlResponse::CacheCleared { success: true }),
                Err(e) => {
                    warn!("cache clear failed: {}", e);
                    Ok(ControlResponse::CacheCleared { success: false })
                }
            },
        }
    }
}
