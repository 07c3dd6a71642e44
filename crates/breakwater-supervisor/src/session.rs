//! Per-resource load session state.

use breakwater_core::ResourceKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::task::JoinHandle;

/// States of a supervised load.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum LoadState {
    /// No load in progress
    Idle,
    /// A load attempt is running with its timeout armed
    Loading,
    /// The last attempt succeeded
    Loaded,
    /// The timeout fired before a load signal arrived
    TimedOut,
    /// An explicit load-error signal arrived
    Failed,
    /// A retry is scheduled
    Retrying,
    /// The retry budget is spent; only an external reset recovers
    Exhausted,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Idle => "IDLE",
            LoadState::Loading => "LOADING",
            LoadState::Loaded => "LOADED",
            LoadState::TimedOut => "TIMED_OUT",
            LoadState::Failed => "FAILED",
            LoadState::Retrying => "RETRYING",
            LoadState::Exhausted => "EXHAUSTED",
        }
    }

    /// Whether the state only exits through an external reset
    pub fn is_terminal(&self) -> bool {
        *self == LoadState::Exhausted
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Internal per-key session owned by the supervisor.
///
/// `epoch` increments on every transition; timer callbacks carry the epoch
/// they were scheduled under and are ignored once it is stale, so a timeout
/// firing after a load has already settled is a no-op.
pub(crate) struct LoadSession {
    pub state: LoadState,
    pub attempts: u32,
    pub epoch: u64,
    pub timer: Option<JoinHandle<()>>,
}

impl LoadSession {
    pub fn new() -> Self {
        Self {
            state: LoadState::Idle,
            attempts: 0,
            epoch: 0,
            timer: None,
        }
    }

    /// Advance the epoch, invalidating any outstanding timer callbacks
    pub fn bump(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Abort the pending timer task, if any
    pub fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

impl Drop for LoadSession {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

/// Read-only view of one session, for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub key: ResourceKey,
    pub state: LoadState,
    pub attempts: u32,
}
