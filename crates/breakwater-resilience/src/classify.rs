//! Failure classification.
//!
//! Classification is deterministic and ordered: connectivity wins over
//! everything, then timeouts, then HTTP status classes, then the generic
//! bucket. The recovery engine maps each class to a recovery path.

use breakwater_core::{ConnectivityState, FetchError, RequestFailure};

/// Category a failed request falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The client is known to be offline
    Offline,
    /// The request exceeded its deadline
    Timeout,
    /// HTTP 5xx
    Server(u16),
    /// HTTP 4xx
    Client(u16),
    /// Anything else: dropped connections, aborts, odd statuses
    Generic,
}

impl FailureClass {
    /// Stable label for diagnostics records
    pub fn label(&self) -> &'static str {
        match self {
            FailureClass::Offline => "offline",
            FailureClass::Timeout => "timeout",
            FailureClass::Server(_) => "server_error",
            FailureClass::Client(_) => "client_error",
            FailureClass::Generic => "network_error",
        }
    }
}

/// Classify a failed attempt given the current connectivity state.
pub fn classify(failure: &RequestFailure, connectivity: ConnectivityState) -> FailureClass {
    if connectivity == ConnectivityState::Offline {
        return FailureClass::Offline;
    }
    match failure {
        RequestFailure::Transport(FetchError::Timeout(_)) => FailureClass::Timeout,
        RequestFailure::HttpStatus(status) if *status >= 500 => FailureClass::Server(*status),
        RequestFailure::HttpStatus(status) if *status >= 400 => FailureClass::Client(*status),
        _ => FailureClass::Generic,
    }
}
