//! Map-backed cache reader for exercising fallback paths without a real
//! cache engine.

use async_trait::async_trait;
use breakwater_core::{CacheReader, ResourceKey, ResourceResponse};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MapCacheReader {
    entries: Arc<Mutex<HashMap<ResourceKey, ResourceResponse>>>,
}

impl MapCacheReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a response available for fallback lookups
    pub fn insert(&self, key: ResourceKey, response: ResourceResponse) {
        self.entries.lock().unwrap().insert(key, response);
    }

    pub fn remove(&self, key: &ResourceKey) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl CacheReader for MapCacheReader {
    async fn cached(&self, key: &ResourceKey) -> Option<ResourceResponse> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}
