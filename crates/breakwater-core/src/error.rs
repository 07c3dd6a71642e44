use std::time::Duration;
use thiserror::Error;

/// Transport-level failure produced by a fetcher.
///
/// These never reach callers directly; they are classified into
/// [`ResilienceError`] after recovery is exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request exceeded its deadline and was aborted
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established or was dropped
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request was aborted for another transport-level reason
    #[error("request aborted: {0}")]
    Aborted(String),
}

/// A failed request attempt: the transport gave out, or the server
/// answered with a non-success status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error("HTTP status {0}")]
    HttpStatus(u16),
}

/// Closed error taxonomy surfaced to callers.
///
/// Local recovery (retry, cache fallback, queueing) is always attempted
/// first; one of these is returned only once every avenue is exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    /// The client is offline; the request was queued for replay
    #[error("offline: request for {url} was queued for replay")]
    Offline { url: String },

    /// The request kept timing out until the retry budget ran out
    #[error("request for {url} timed out after {attempts} retries")]
    Timeout { url: String, attempts: u32 },

    /// The server kept failing until the retry budget ran out
    #[error("server error {status} for {url} after {attempts} retries")]
    Server {
        url: String,
        status: u16,
        attempts: u32,
    },

    /// The resource does not exist
    #[error("resource not found: {url}")]
    NotFound { url: String },

    /// The request was rejected by the server and will not be retried
    #[error("client error {status} for {url}")]
    Client { url: String, status: u16 },

    /// Unclassified network failure with no cached fallback
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },
}

impl ResilienceError {
    /// Stable category label, used for diagnostics records
    pub fn kind(&self) -> &'static str {
        match self {
            ResilienceError::Offline { .. } => "offline",
            ResilienceError::Timeout { .. } => "timeout",
            ResilienceError::Server { .. } => "server_error",
            ResilienceError::NotFound { .. } => "not_found",
            ResilienceError::Client { .. } => "client_error",
            ResilienceError::Network { .. } => "network_error",
        }
    }

    /// The URL the failed request was addressed to
    pub fn url(&self) -> &str {
        match self {
            ResilienceError::Offline { url }
            | ResilienceError::Timeout { url, .. }
            | ResilienceError::Server { url, .. }
            | ResilienceError::NotFound { url }
            | ResilienceError::Client { url, .. }
            | ResilienceError::Network { url, .. } => url,
        }
    }
}
