//! Cache strategies and their category mapping.

use breakwater_core::ResourceCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::GenerationName;

/// Read/write discipline applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Serve from cache when possible; the network is only contacted on a miss
    CacheFirst,
    /// Always try the network, falling back to cache on failure
    NetworkFirst,
    /// Serve a cached entry immediately and refresh it in the background
    StaleWhileRevalidate,
}

/// Mapping from resource category to strategy.
///
/// This is configuration, not logic; hosts override it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMap(HashMap<ResourceCategory, CacheStrategy>);

impl StrategyMap {
    pub fn new(mapping: HashMap<ResourceCategory, CacheStrategy>) -> Self {
        Self(mapping)
    }

    /// Strategy for a category; unmapped categories go network-first
    pub fn strategy_for(&self, category: ResourceCategory) -> CacheStrategy {
        self.0
            .get(&category)
            .copied()
            .unwrap_or(CacheStrategy::NetworkFirst)
    }
}

impl Default for StrategyMap {
    fn default() -> Self {
        let mut mapping = HashMap::new();
        mapping.insert(ResourceCategory::Document, CacheStrategy::NetworkFirst);
        mapping.insert(ResourceCategory::Stylesheet, CacheStrategy::CacheFirst);
        mapping.insert(ResourceCategory::Script, CacheStrategy::CacheFirst);
        mapping.insert(ResourceCategory::Image, CacheStrategy::StaleWhileRevalidate);
        mapping.insert(ResourceCategory::Data, CacheStrategy::NetworkFirst);
        Self(mapping)
    }
}

/// Cache engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Namespace shared by all generations of this cache
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Version tag of the current generation
    #[serde(default = "default_version")]
    pub version: u32,

    /// Validity window enforced when entries are read, in milliseconds
    #[serde(default = "default_max_entry_age_ms")]
    pub max_entry_age_ms: u64,

    /// Category-to-strategy mapping
    #[serde(default)]
    pub strategies: StrategyMap,
}

fn default_namespace() -> String {
    "breakwater".to_string()
}

fn default_version() -> u32 {
    1
}

fn default_max_entry_age_ms() -> u64 {
    24 * 60 * 60 * 1000 // 24 hours
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            version: default_version(),
            max_entry_age_ms: default_max_entry_age_ms(),
            strategies: StrategyMap::default(),
        }
    }
}

impl CacheConfig {
    /// Name of the generation this configuration targets
    pub fn generation(&self) -> GenerationName {
        GenerationName::new(&self.namespace, self.version)
    }

    /// Validity window as a std Duration
    pub fn max_entry_age(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.max_entry_age_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_map() {
        let map = StrategyMap::default();
        assert_eq!(
            map.strategy_for(ResourceCategory::Script),
            CacheStrategy::CacheFirst
        );
        assert_eq!(
            map.strategy_for(ResourceCategory::Data),
            CacheStrategy::NetworkFirst
        );
        assert_eq!(
            map.strategy_for(ResourceCategory::Image),
            CacheStrategy::StaleWhileRevalidate
        );
    }

    #[test]
    fn test_config_generation_name() {
        let config = CacheConfig {
            namespace: "catalog".to_string(),
            version: 4,
            ..CacheConfig::default()
        };
        assert_eq!(config.generation().as_str(), "catalog-v4");
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&CacheStrategy::StaleWhileRevalidate).unwrap();
        assert_eq!(json, "\"stale-while-revalidate\"");
    }
}
