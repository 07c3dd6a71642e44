//! Configuration for the Breakwater engine
//!
//! This module contains the aggregated configuration types and loading
//! functionality. Every limit the engine enforces (retry budgets, queue
//! TTL, load timeout, cache validity window) lives here rather than as a
//! literal in the code.

use breakwater_cache::CacheConfig;
use breakwater_resilience::{OfflineQueueConfig, RetryPolicy};
use breakwater_supervisor::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakwaterConfig {
    /// Cache namespace, generation version and strategy mapping
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry budget and backoff base for data requests
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Offline replay queue bounds
    #[serde(default)]
    pub offline_queue: OfflineQueueConfig,

    /// Load supervision timing for embedded content
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Capacity of the diagnostics error log
    #[serde(default = "default_error_log_capacity")]
    pub error_log_capacity: usize,

    /// Per-request network deadline in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Log level filter
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_error_log_capacity() -> usize {
    100
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for BreakwaterConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            offline_queue: OfflineQueueConfig::default(),
            supervisor: SupervisorConfig::default(),
            error_log_capacity: default_error_log_capacity(),
            request_timeout_ms: default_request_timeout_ms(),
            log_filter: default_log_filter(),
        }
    }
}

impl BreakwaterConfig {
    /// Load configuration from environment variables on top of defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Ok(namespace) = env::var("BREAKWATER_CACHE_NAMESPACE") {
            config.cache.namespace = namespace;
        }

        if let Ok(version) = env::var("BREAKWATER_CACHE_VERSION") {
            match version.parse::<u32>() {
                Ok(version) => config.cache.version = version,
                Err(_) => warn!("Invalid BREAKWATER_CACHE_VERSION value: {}", version),
            }
        }

        if let Ok(max_retries) = env::var("BREAKWATER_MAX_RETRIES") {
            match max_retries.parse::<u32>() {
                Ok(max_retries) => {
                    config.retry.max_attempts = max_retries;
                    config.supervisor.max_retries = max_retries;
                }
                Err(_) => warn!("Invalid BREAKWATER_MAX_RETRIES value: {}", max_retries),
            }
        }

        if let Ok(base_delay) = env::var("BREAKWATER_RETRY_BASE_DELAY_MS") {
            match base_delay.parse::<u64>() {
                Ok(base_delay) => config.retry.base_delay_ms = base_delay,
                Err(_) => warn!("Invalid BREAKWATER_RETRY_BASE_DELAY_MS value: {}", base_delay),
            }
        }

        if let Ok(ttl) = env::var("BREAKWATER_QUEUE_TTL_MS") {
            match ttl.parse::<u64>() {
                Ok(ttl) => config.offline_queue.ttl_ms = ttl,
                Err(_) => warn!("Invalid BREAKWATER_QUEUE_TTL_MS value: {}", ttl),
            }
        }

        if let Ok(timeout) = env::var("BREAKWATER_LOAD_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(timeout) => config.supervisor.load_timeout_ms = timeout,
                Err(_) => warn!("Invalid BREAKWATER_LOAD_TIMEOUT_MS value: {}", timeout),
            }
        }

        if let Ok(timeout) = env::var("BREAKWATER_REQUEST_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(timeout) => config.request_timeout_ms = timeout,
                Err(_) => warn!("Invalid BREAKWATER_REQUEST_TIMEOUT_MS value: {}", timeout),
            }
        }

        if let Ok(filter) = env::var("BREAKWATER_LOG_FILTER") {
            config.log_filter = filter;
        }

        config
    }

    /// Per-request network deadline
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
