//! The recovery engine.
//!
//! Wraps a request pipeline with classified failure handling: bounded
//! retries with backoff, cache fallbacks, offline queueing, and a closed
//! set of typed errors once every avenue is exhausted.

use crate::classify::{classify, FailureClass};
use crate::error_log::{ErrorLog, ErrorRecord, Severity};
use crate::offline_queue::OfflineQueue;
use crate::retry::{BackoffKind, RetryLedger, RetryPolicy};
use breakwater_core::{
    CacheReader, ConnectivityMonitor, FetchError, RequestFailure, RequestHandler,
    ResilienceError, ResourceRequest, ResourceResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the engine decided to do about one failed attempt.
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// A retry is warranted after the given backoff delay
    Retried { delay: Duration },
    /// A cached response stands in for the failed request
    FellBackToCache(ResourceResponse),
    /// The request was queued for replay and nothing cached was available
    Queued,
    /// Recovery is exhausted; the typed error is final
    Failed(ResilienceError),
}

/// Recovery engine wrapping an inner request pipeline.
pub struct RecoveryEngine {
    inner: Arc<dyn RequestHandler>,
    cache: Arc<dyn CacheReader>,
    queue: OfflineQueue,
    connectivity: ConnectivityMonitor,
    ledger: RetryLedger,
    policy: RetryPolicy,
    error_log: ErrorLog,
}

impl RecoveryEngine {
    pub fn new(
        inner: Arc<dyn RequestHandler>,
        cache: Arc<dyn CacheReader>,
        queue: OfflineQueue,
        connectivity: ConnectivityMonitor,
        policy: RetryPolicy,
        error_log: ErrorLog,
    ) -> Self {
        Self {
            inner,
            cache,
            queue,
            connectivity,
            ledger: RetryLedger::new(),
            policy,
            error_log,
        }
    }

    /// The offline replay queue
    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// The retry ledger
    pub fn ledger(&self) -> &RetryLedger {
        &self.ledger
    }

    /// Decide how to recover from one failed attempt.
    ///
    /// This is a single classification step; [`execute`](Self::execute)
    /// drives it in a loop until success or a terminal outcome.
    pub async fn handle(
        &self,
        failure: &RequestFailure,
        request: &ResourceRequest,
    ) -> RecoveryOutcome {
        let key = request.key();
        let class = classify(failure, self.connectivity.state());
        debug!("classified failure for {} as {:?}", key, class);

        match class {
            FailureClass::Offline => {
                self.queue.enqueue(request.clone()).await;
                self.log_failure(FailureClass::Offline, request, Severity::Warning)
                    .await;
                match self.cache.cached(&key).await {
                    Some(response) => {
                        info!("offline, serving cached response for {}", key);
                        RecoveryOutcome::FellBackToCache(response)
                    }
                    None => RecoveryOutcome::Queued,
                }
            }
            FailureClass::Timeout => {
                self.retry_or_exhaust(request, BackoffKind::Linear, |attempts| {
                    ResilienceError::Timeout {
                        url: request.url.clone(),
                        attempts,
                    }
                })
                .await
            }
            FailureClass::Server(status) => {
                self.retry_or_exhaust(request, BackoffKind::Exponential, |attempts| {
                    ResilienceError::Server {
                        url: request.url.clone(),
                        status,
                        attempts,
                    }
                })
                .await
            }
            FailureClass::Client(status) => {
                // client errors are never retried
                let error = if status == 404 {
                    ResilienceError::NotFound {
                        url: request.url.clone(),
                    }
                } else {
                    ResilienceError::Client {
                        url: request.url.clone(),
                        status,
                    }
                };
                self.log_failure(class, request, Severity::Warning).await;
                RecoveryOutcome::Failed(error)
            }
            FailureClass::Generic => match self.cache.cached(&key).await {
                Some(response) => {
                    info!("network failure for {}, serving cached response", key);
                    RecoveryOutcome::FellBackToCache(response)
                }
                None => {
                    self.log_failure(class, request, Severity::Critical).await;
                    RecoveryOutcome::Failed(ResilienceError::Network {
                        url: request.url.clone(),
                        reason: failure.to_string(),
                    })
                }
            },
        }
    }

    async fn retry_or_exhaust(
        &self,
        request: &ResourceRequest,
        kind: BackoffKind,
        exhausted: impl FnOnce(u32) -> ResilienceError,
    ) -> RecoveryOutcome {
        let key = request.key();
        let failures = self.ledger.record_failure(&key).await;

        if failures <= self.policy.max_attempts {
            let delay = self.policy.delay_for(kind, failures);
            debug!(
                "scheduling retry {}/{} for {} in {:?}",
                failures, self.policy.max_attempts, key, delay
            );
            RecoveryOutcome::Retried { delay }
        } else {
            warn!(
                "retry budget for {} exhausted after {} attempts",
                key, self.policy.max_attempts
            );
            self.ledger.clear(&key).await;
            let class = match kind {
                BackoffKind::Linear => FailureClass::Timeout,
                BackoffKind::Exponential => FailureClass::Server(0),
            };
            self.log_failure(class, request, Severity::Critical).await;
            RecoveryOutcome::Failed(exhausted(self.policy.max_attempts))
        }
    }

    async fn log_failure(
        &self,
        class: FailureClass,
        request: &ResourceRequest,
        severity: Severity,
    ) {
        self.error_log
            .record(ErrorRecord::new(class.label(), &request.url, severity))
            .await;
    }

    /// Execute a request with full recovery handling.
    ///
    /// Retries sleep out their backoff delay in place. Connectivity is
    /// checked before every attempt so a client that went offline mid-retry
    /// does not issue futile network calls.
    pub async fn execute(
        &self,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, ResilienceError> {
        let key = request.key();

        loop {
            let attempt = if self.connectivity.is_online() {
                self.inner.execute(request).await
            } else {
                // short-circuit straight into offline handling
                Err(RequestFailure::Transport(FetchError::Connection(
                    "client is offline".to_string(),
                )))
            };

            let failure = match attempt {
                Ok(response) => {
                    self.ledger.clear(&key).await;
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            match self.handle(&failure, request).await {
                RecoveryOutcome::Retried { delay } => {
                    tokio::time::sleep(delay).await;
                }
                RecoveryOutcome::FellBackToCache(response) => return Ok(response),
                RecoveryOutcome::Queued => {
                    return Err(ResilienceError::Offline {
                        url: request.url.clone(),
                    })
                }
                RecoveryOutcome::Failed(error) => return Err(error),
            }
        }
    }

    /// Drop all recovery state tied to a key: its retry record and any
    /// queued replays.
    pub async fn abandon(&self, key: &breakwater_core::ResourceKey) {
        self.ledger.clear(key).await;
        let purged = self.queue.purge_key(key).await;
        if purged > 0 {
            debug!("abandoned {} queued replay(s) for {}", purged, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline_queue::OfflineQueueConfig;
    use crate::state_store::InMemoryStateStore;
    use breakwater_core::DirectHandler;
    use breakwater_test_utils::{data_request, ok_response, status_response, MapCacheReader, MockFetcher};
    use std::time::Instant;

    fn engine_with(
        fetcher: MockFetcher,
        cache: MapCacheReader,
        policy: RetryPolicy,
    ) -> (RecoveryEngine, ConnectivityMonitor) {
        let connectivity = ConnectivityMonitor::online();
        let engine = RecoveryEngine::new(
            Arc::new(DirectHandler::new(Arc::new(fetcher))),
            Arc::new(cache),
            OfflineQueue::new(OfflineQueueConfig::default()),
            connectivity.clone(),
            policy,
            ErrorLog::new(100, Arc::new(InMemoryStateStore::new())),
        );
        (engine, connectivity)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");
        fetcher.script(&request.key(), vec![Ok(ok_response(b"data"))]);

        let (engine, _) = engine_with(fetcher, MapCacheReader::new(), fast_policy());
        let response = engine.execute(&request).await.unwrap();
        assert_eq!(response.body, b"data");
        assert!(engine.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn test_server_errors_retry_then_surface() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");
        fetcher.always(&request.key(), Ok(status_response(503)));

        let (engine, _) = engine_with(fetcher.clone(), MapCacheReader::new(), fast_policy());
        let error = engine.execute(&request).await.unwrap_err();

        assert_eq!(
            error,
            ResilienceError::Server {
                url: "https://g.example/games.json".to_string(),
                status: 503,
                attempts: 3,
            }
        );
        // initial attempt plus three retries
        assert_eq!(fetcher.calls_for(&request.key()), 4);
        // exhaustion clears the ledger
        assert!(engine.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn test_exponential_backoff_delays_are_applied() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");
        fetcher.always(&request.key(), Ok(status_response(503)));

        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 20,
        };
        let (engine, _) = engine_with(fetcher, MapCacheReader::new(), policy);

        let started = Instant::now();
        let _ = engine.execute(&request).await;
        // 20 + 40 + 80 = 140ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(140));
    }

    #[tokio::test]
    async fn test_retry_succeeds_mid_schedule() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");
        fetcher.script(
            &request.key(),
            vec![Ok(status_response(500)), Ok(ok_response(b"recovered"))],
        );

        let (engine, _) = engine_with(fetcher.clone(), MapCacheReader::new(), fast_policy());
        let response = engine.execute(&request).await.unwrap();

        assert_eq!(response.body, b"recovered");
        assert_eq!(fetcher.calls_for(&request.key()), 2);
        assert!(engine.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games/999");
        fetcher.always(&request.key(), Ok(status_response(404)));

        let (engine, _) = engine_with(fetcher.clone(), MapCacheReader::new(), fast_policy());
        let error = engine.execute(&request).await.unwrap_err();

        assert_eq!(
            error,
            ResilienceError::NotFound {
                url: "https://g.example/games/999".to_string(),
            }
        );
        assert_eq!(fetcher.calls_for(&request.key()), 1);
    }

    #[tokio::test]
    async fn test_offline_with_cached_data_falls_back() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");

        let cache = MapCacheReader::new();
        cache.insert(request.key(), ok_response(b"cached"));

        let (engine, connectivity) = engine_with(fetcher.clone(), cache, fast_policy());
        connectivity.set_offline();

        let response = engine.execute(&request).await.unwrap();
        assert_eq!(response.body, b"cached");
        // offline short-circuit: no network call, but the request is queued
        assert_eq!(fetcher.total_calls(), 0);
        assert_eq!(engine.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_offline_without_cache_queues_and_fails() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");

        let (engine, connectivity) = engine_with(fetcher, MapCacheReader::new(), fast_policy());
        connectivity.set_offline();

        let error = engine.execute(&request).await.unwrap_err();
        assert_eq!(
            error,
            ResilienceError::Offline {
                url: "https://g.example/games.json".to_string(),
            }
        );
        assert_eq!(engine.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_generic_failure_falls_back_to_cache() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");
        fetcher.always(
            &request.key(),
            Err(FetchError::Connection("reset".to_string())),
        );

        let cache = MapCacheReader::new();
        cache.insert(request.key(), ok_response(b"stale but present"));

        let (engine, _) = engine_with(fetcher, cache, fast_policy());
        let response = engine.execute(&request).await.unwrap();
        assert_eq!(response.body, b"stale but present");
    }

    #[tokio::test]
    async fn test_generic_failure_without_cache_is_network_error() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");
        fetcher.always(
            &request.key(),
            Err(FetchError::Connection("reset".to_string())),
        );

        let (engine, _) = engine_with(fetcher, MapCacheReader::new(), fast_policy());
        let error = engine.execute(&request).await.unwrap_err();
        assert!(matches!(error, ResilienceError::Network { .. }));
    }

    #[tokio::test]
    async fn test_abandon_clears_ledger_and_queue() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games.json");

        let (engine, connectivity) = engine_with(fetcher, MapCacheReader::new(), fast_policy());
        connectivity.set_offline();
        let _ = engine.execute(&request).await;
        engine.ledger().record_failure(&request.key()).await;

        engine.abandon(&request.key()).await;
        assert!(engine.queue().is_empty().await);
        assert_eq!(engine.ledger().attempts(&request.key()).await, 0);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_in_error_log() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/games/404");
        fetcher.always(&request.key(), Ok(status_response(404)));

        let store = Arc::new(InMemoryStateStore::new());
        let error_log = ErrorLog::new(100, store);
        let engine = RecoveryEngine::new(
            Arc::new(DirectHandler::new(Arc::new(fetcher))),
            Arc::new(MapCacheReader::new()),
            OfflineQueue::new(OfflineQueueConfig::default()),
            ConnectivityMonitor::online(),
            fast_policy(),
            error_log.clone(),
        );

        let _ = engine.execute(&request).await;
        let records = error_log.export().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "client_error");
    }
}
