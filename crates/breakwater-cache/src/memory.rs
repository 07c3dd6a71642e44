//! In-memory implementation of CacheStore
//!
//! Backs the engine in tests and in hosts without a persistent cache. All
//! data is lost when the instance is dropped.

use crate::{CacheEntry, CacheResult, CacheStore, GenerationName};
use async_trait::async_trait;
use breakwater_core::ResourceKey;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory implementation of CacheStore
///
/// Generations map to per-key entry tables. Writes replace whole entries,
/// which gives the atomic per-key last-write-wins semantics the engine
/// relies on.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheStore {
    generations: Arc<DashMap<GenerationName, HashMap<ResourceKey, CacheEntry>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn put(&self, generation: &GenerationName, entry: CacheEntry) -> CacheResult<()> {
        self.generations
            .entry(generation.clone())
            .or_default()
            .insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn get(
        &self,
        generation: &GenerationName,
        key: &ResourceKey,
    ) -> CacheResult<Option<CacheEntry>> {
        Ok(self
            .generations
            .get(generation)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn list_keys(&self, generation: &GenerationName) -> CacheResult<Vec<ResourceKey>> {
        Ok(self
            .generations
            .get(generation)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn entry_count(&self, generation: &GenerationName) -> CacheResult<usize> {
        Ok(self
            .generations
            .get(generation)
            .map(|entries| entries.len())
            .unwrap_or(0))
    }

    async fn list_generations(&self) -> CacheResult<Vec<GenerationName>> {
        Ok(self.generations.iter().map(|g| g.key().clone()).collect())
    }

    async fn delete_generation(&self, generation: &GenerationName) -> CacheResult<bool> {
        Ok(self.generations.remove(generation).is_some())
    }
}
