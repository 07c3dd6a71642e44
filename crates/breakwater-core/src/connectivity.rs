//! Connectivity tracking fed by host online/offline events.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Whether the client currently has network connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    #[inline]
    pub fn is_online(self) -> bool {
        self == ConnectivityState::Online
    }
}

/// Shared connectivity monitor.
///
/// The host pushes online/offline transition events in; components read the
/// current state synchronously or subscribe to transitions. Cloning shares
/// the underlying channel.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Monitor starting in the online state
    pub fn online() -> Self {
        Self::new(ConnectivityState::Online)
    }

    /// Current connectivity state
    pub fn state(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Record a host "online" event
    pub fn set_online(&self) {
        let previous = self.tx.send_replace(ConnectivityState::Online);
        if previous == ConnectivityState::Offline {
            info!("connectivity restored");
        }
    }

    /// Record a host "offline" event
    pub fn set_offline(&self) {
        let previous = self.tx.send_replace(ConnectivityState::Offline);
        if previous == ConnectivityState::Online {
            info!("connectivity lost");
        }
    }

    /// Subscribe to connectivity transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::online()
    }
}
