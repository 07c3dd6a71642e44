//! The cache strategy engine.
//!
//! Intercepts resource requests and applies the configured strategy for the
//! request's category, persisting successful responses into the current
//! generation as a side effect. Also owns the generation lifecycle:
//! installation (manifest seeding) and activation (old-generation cleanup).

use crate::{
    CacheConfig, CacheEntry, CacheError, CacheResult, CacheStore, CacheStrategy, GenerationName,
};
use async_trait::async_trait;
use breakwater_core::{
    CacheReader, RequestFailure, RequestHandler, ResourceFetcher, ResourceKey, ResourceRequest,
    ResourceResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ordered list of resources that must be present in a generation before it
/// may become current.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallManifest {
    pub resources: Vec<ResourceRequest>,
}

impl InstallManifest {
    pub fn new(resources: Vec<ResourceRequest>) -> Self {
        Self { resources }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Strategy-driven cache engine.
///
/// Cheap to clone; clones share the underlying store and fetcher.
#[derive(Clone)]
pub struct CacheEngine {
    config: CacheConfig,
    generation: GenerationName,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn ResourceFetcher>,
}

impl CacheEngine {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        let generation = config.generation();
        debug!("creating cache engine for generation {}", generation);
        Self {
            config,
            generation,
            store,
            fetcher,
        }
    }

    /// The generation this engine reads and writes
    pub fn generation(&self) -> &GenerationName {
        &self.generation
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Fresh-entry lookup; stale entries and storage errors read as absent.
    pub async fn lookup(&self, key: &ResourceKey) -> Option<ResourceResponse> {
        match self.store.get(&self.generation, key).await {
            Ok(Some(entry)) if entry.is_fresh(self.config.max_entry_age()) => Some(entry.response),
            Ok(Some(_)) => {
                debug!("cache entry for {} expired, treating as miss", key);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("cache lookup for {} failed: {}", key, e);
                None
            }
        }
    }

    /// Fetch from the network and write-through on success.
    ///
    /// A failed write never corrupts a previously stored entry; the store
    /// replaces entries whole or not at all.
    async fn fetch_and_store(
        &self,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, RequestFailure> {
        let response = self.fetcher.fetch(request).await?;
        if !response.is_success() {
            return Err(RequestFailure::HttpStatus(response.status));
        }

        let entry = CacheEntry::new(request.key(), response.clone());
        if let Err(e) = self.store.put(&self.generation, entry).await {
            warn!("failed to cache response for {}: {}", request.url, e);
        }
        Ok(response)
    }

    /// Seed the engine's generation from an install manifest.
    ///
    /// Resources are fetched in manifest order. If any of them fails the
    /// partially seeded generation is deleted and the installation fails as
    /// a whole; a generation is never promoted half-populated.
    pub async fn install(&self, manifest: &InstallManifest) -> CacheResult<()> {
        info!(
            "installing generation {} from manifest of {} resources",
            self.generation,
            manifest.len()
        );

        for request in &manifest.resources {
            match self.fetcher.fetch(request).await {
                Ok(response) if response.is_success() => {
                    let entry = CacheEntry::new(request.key(), response);
                    self.store.put(&self.generation, entry).await?;
                }
                Ok(response) => {
                    self.rollback_install().await;
                    return Err(CacheError::InstallFailed {
                        url: request.url.clone(),
                        reason: format!("HTTP status {}", response.status),
                    });
                }
                Err(e) => {
                    self.rollback_install().await;
                    return Err(CacheError::InstallFailed {
                        url: request.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("generation {} installed", self.generation);
        Ok(())
    }

    async fn rollback_install(&self) {
        warn!("install failed, discarding generation {}", self.generation);
        if let Err(e) = self.store.delete_generation(&self.generation).await {
            warn!("failed to discard generation {}: {}", self.generation, e);
        }
    }

    /// Promote this engine's generation: delete every other generation in
    /// the same namespace. Idempotent; re-activating is a no-op.
    pub async fn activate(&self) -> CacheResult<usize> {
        let generations = self.store.list_generations().await?;
        let stale: Vec<GenerationName> = generations
            .into_iter()
            .filter(|g| g != &self.generation && g.shares_namespace(&self.generation))
            .collect();

        let mut removed = 0;
        for generation in &stale {
            if self.store.delete_generation(generation).await? {
                debug!("removed stale generation {}", generation);
                removed += 1;
            }
        }

        if removed > 0 {
            info!(
                "activated generation {}, removed {} stale generation(s)",
                self.generation, removed
            );
        }
        Ok(removed)
    }

    /// Delete every generation in the store, current included.
    pub async fn clear_all(&self) -> CacheResult<usize> {
        let generations = self.store.list_generations().await?;
        let deletions = generations
            .iter()
            .map(|g| self.store.delete_generation(g));
        let results = futures::future::join_all(deletions).await;

        let mut removed = 0;
        for result in results {
            if result? {
                removed += 1;
            }
        }
        info!("cleared {} cache generation(s)", removed);
        Ok(removed)
    }
}

#[async_trait]
impl RequestHandler for CacheEngine {
    async fn execute(
        &self,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, RequestFailure> {
        let key = request.key();
        let strategy = self.config.strategies.strategy_for(request.category);

        match strategy {
            CacheStrategy::CacheFirst => {
                if let Some(response) = self.lookup(&key).await {
                    debug!("cache-first hit for {}", key);
                    return Ok(response);
                }
                self.fetch_and_store(request).await
            }
            CacheStrategy::NetworkFirst => match self.fetch_and_store(request).await {
                Ok(response) => Ok(response),
                Err(failure) => {
                    warn!(
                        "network-first fetch for {} failed ({}), trying cache",
                        key, failure
                    );
                    match self.lookup(&key).await {
                        Some(response) => Ok(response),
                        None => Err(failure),
                    }
                }
            },
            CacheStrategy::StaleWhileRevalidate => {
                if let Some(response) = self.lookup(&key).await {
                    debug!("serving stale entry for {}, revalidating in background", key);
                    let engine = self.clone();
                    let request = request.clone();
                    tokio::spawn(async move {
                        // The caller already has a response; refresh failures
                        // are logged and swallowed.
                        if let Err(e) = engine.fetch_and_store(&request).await {
                            debug!("background revalidation of {} failed: {}", request.url, e);
                        }
                    });
                    return Ok(response);
                }
                self.fetch_and_store(request).await
            }
        }
    }
}

#[async_trait]
impl CacheReader for CacheEngine {
    async fn cached(&self, key: &ResourceKey) -> Option<ResourceResponse> {
        self.lookup(key).await
    }
}
