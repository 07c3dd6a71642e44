//! Core types for the Breakwater resilience and caching layer.
//!
//! This crate holds the request/response model, the closed error taxonomy
//! surfaced to callers, the connectivity monitor and the seam traits the
//! cache, recovery and supervision crates plug into.

pub mod connectivity;
pub mod error;
pub mod fetcher;
pub mod types;

pub use connectivity::{ConnectivityMonitor, ConnectivityState};
pub use error::{FetchError, RequestFailure, ResilienceError};
pub use fetcher::{CacheReader, DirectHandler, ReachabilityProbe, RequestHandler, ResourceFetcher};
pub use types::{HttpMethod, ResourceCategory, ResourceKey, ResourceRequest, ResourceResponse};
