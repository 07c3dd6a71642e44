//! Breakwater cache layer.
//!
//! Provides the versioned, generation-partitioned cache store abstraction
//! and the strategy engine that decides whether a request is served from
//! cache, network, or both.

use async_trait::async_trait;
use breakwater_core::{ResourceKey, ResourceResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod control;
pub mod engine;
pub mod http;
pub mod memory;
pub mod strategy;

pub use control::{ControlMessage, ControlResponse};
pub use engine::{CacheEngine, InstallManifest};
pub use http::HttpResourceFetcher;
pub use memory::InMemoryCacheStore;
pub use strategy::{CacheConfig, CacheStrategy, StrategyMap};

/// Name of a cache generation: `<namespace>-v<version>`.
///
/// Exactly one generation per namespace is current at a time; the others
/// are garbage once a new one is activated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationName(String);

impl GenerationName {
    /// Build a generation name from a namespace and version tag
    pub fn new(namespace: &str, version: u32) -> Self {
        Self(format!("{}-v{}", namespace, version))
    }

    /// Parse a generation name, validating the `<namespace>-v<version>` shape
    pub fn parse(name: &str) -> CacheResult<Self> {
        let valid = name
            .rsplit_once("-v")
            .map(|(namespace, version)| {
                !namespace.is_empty() && !version.is_empty() && version.chars().all(|c| c.is_ascii_digit())
            })
            .unwrap_or(false);
        if !valid {
            return Err(CacheError::InvalidGenerationName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Get the string representation of the name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace portion, without the version suffix
    pub fn namespace(&self) -> &str {
        // parse() guarantees the separator is present for validated names
        self.0.rsplit_once("-v").map(|(ns, _)| ns).unwrap_or(&self.0)
    }

    /// Whether two generations belong to the same namespace
    pub fn shares_namespace(&self, other: &GenerationName) -> bool {
        self.namespace() == other.namespace()
    }
}

impl fmt::Display for GenerationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored response plus bookkeeping.
///
/// Entries are immutable once written; updating a key overwrites the whole
/// entry rather than mutating it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: ResourceKey,
    pub response: ResourceResponse,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: ResourceKey, response: ResourceResponse) -> Self {
        Self {
            key,
            response,
            stored_at: Utc::now(),
        }
    }

    /// Whether the entry is still within its validity window
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.stored_at);
        match chrono::Duration::from_std(max_age) {
            Ok(max) => age < max,
            // windows beyond chrono's range never expire
            Err(_) => true,
        }
    }
}

/// Errors from cache store and lifecycle operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("invalid generation name: {0}")]
    InvalidGenerationName(String),

    #[error("install failed for {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Contract for cache storage implementations.
///
/// Writes are atomic per key and last-write-wins; a failed write must leave
/// any existing entry for that key intact.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Insert an entry into a generation, overwriting any entry for its key
    async fn put(&self, generation: &GenerationName, entry: CacheEntry) -> CacheResult<()>;

    /// Look up an entry by key
    async fn get(
        &self,
        generation: &GenerationName,
        key: &ResourceKey,
    ) -> CacheResult<Option<CacheEntry>>;

    /// Enumerate the keys stored in a generation
    async fn list_keys(&self, generation: &GenerationName) -> CacheResult<Vec<ResourceKey>>;

    /// Number of entries in a generation
    async fn entry_count(&self, generation: &GenerationName) -> CacheResult<usize>;

    /// Enumerate all generations present in the store
    async fn list_generations(&self) -> CacheResult<Vec<GenerationName>>;

    /// Delete a whole generation; returns whether it existed
    async fn delete_generation(&self, generation: &GenerationName) -> CacheResult<bool>;
}
