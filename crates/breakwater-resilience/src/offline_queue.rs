//! Replay queue for requests issued while offline.

use breakwater_core::{RequestHandler, ResourceKey, ResourceRequest};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Configuration for the offline queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineQueueConfig {
    /// Maximum number of queued requests
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Time-to-live for queued requests in milliseconds
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_max_items() -> usize {
    50
}

fn default_ttl_ms() -> u64 {
    5 * 60 * 1000 // 5 minutes
}

impl Default for OfflineQueueConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            ttl_ms: default_ttl_ms(),
        }
    }
}

/// A request waiting for connectivity to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    pub request: ResourceRequest,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedRequest {
    fn is_expired(&self, ttl_ms: u64, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.enqueued_at) >= ChronoDuration::milliseconds(ttl_ms as i64)
    }
}

/// Offline queue statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub item_count: usize,
    pub max_items: usize,
    /// Requests successfully replayed over the queue's lifetime
    pub replayed_count: u64,
    /// Requests dropped by overflow or expiry
    pub dropped_count: u64,
}

struct QueueState {
    items: VecDeque<QueuedRequest>,
    replayed_count: u64,
    dropped_count: u64,
}

/// Bounded FIFO of requests to replay when connectivity returns.
///
/// All access goes through one internal mutex, so enqueue and drain never
/// interleave in a way that loses or duplicates items.
#[derive(Clone)]
pub struct OfflineQueue {
    config: OfflineQueueConfig,
    state: Arc<Mutex<QueueState>>,
}

impl OfflineQueue {
    pub fn new(config: OfflineQueueConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::new(),
                replayed_count: 0,
                dropped_count: 0,
            })),
        }
    }

    /// Queue a request for replay; past capacity the oldest item is dropped.
    /// Returns the queued item's id.
    pub async fn enqueue(&self, request: ResourceRequest) -> String {
        let mut state = self.state.lock().await;

        if state.items.len() >= self.config.max_items {
            state.items.pop_front();
            state.dropped_count += 1;
            warn!("offline queue is full, discarding oldest item");
        }

        let item = QueuedRequest {
            id: uuid::Uuid::new_v4().to_string(),
            request,
            enqueued_at: Utc::now(),
        };
        let id = item.id.clone();
        debug!("queued {} for offline replay", item.request.url);
        state.items.push_back(item);
        id
    }

    /// Replay queued requests in original order.
    ///
    /// Expired items are dropped without being replayed. Items whose replay
    /// fails are re-enqueued while they are still within their TTL and
    /// discarded otherwise. Returns the number successfully replayed.
    pub async fn drain(&self, handler: &dyn RequestHandler) -> usize {
        // take the whole queue; replay happens outside the lock
        let items: Vec<QueuedRequest> = {
            let mut state = self.state.lock().await;
            state.items.drain(..).collect()
        };

        if items.is_empty() {
            return 0;
        }
        debug!("draining offline queue, {} item(s)", items.len());

        let mut processed = 0;
        for item in items {
            let now = Utc::now();
            if item.is_expired(self.config.ttl_ms, now) {
                debug!("dropping expired offline item for {}", item.request.url);
                self.state.lock().await.dropped_count += 1;
                continue;
            }

            match handler.execute(&item.request).await {
                Ok(_) => {
                    processed += 1;
                    self.state.lock().await.replayed_count += 1;
                }
                Err(e) => {
                    warn!("replay of {} failed: {}", item.request.url, e);
                    let mut state = self.state.lock().await;
                    if item.is_expired(self.config.ttl_ms, Utc::now()) {
                        state.dropped_count += 1;
                    } else {
                        state.items.push_back(item);
                    }
                }
            }
        }

        processed
    }

    /// Remove every queued request with the given identity; returns the
    /// number removed.
    pub async fn purge_key(&self, key: &ResourceKey) -> usize {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|item| &item.request.key() != key);
        before - state.items.len()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    /// Current statistics for the queue
    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        QueueStats {
            item_count: state.items.len(),
            max_items: self.config.max_items,
            replayed_count: state.replayed_count,
            dropped_count: state.dropped_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breakwater_core::DirectHandler;
    use breakwater_test_utils::{data_request, ok_response, MockFetcher};
    use std::sync::Arc as StdArc;
    use std::time::Duration;

    fn queue(max_items: usize, ttl_ms: u64) -> OfflineQueue {
        OfflineQueue::new(OfflineQueueConfig { max_items, ttl_ms })
    }

    #[tokio::test]
    async fn test_capacity_bound_drops_oldest() {
        let queue = queue(3, 60_000);
        for i in 0..5 {
            queue
                .enqueue(data_request(&format!("https://g.example/{}", i)))
                .await;
        }

        assert_eq!(queue.len().await, 3);
        let stats = queue.stats().await;
        assert_eq!(stats.dropped_count, 2);

        // the two oldest are gone
        assert_eq!(
            queue
                .purge_key(&breakwater_core::ResourceKey::get("https://g.example/0"))
                .await,
            0
        );
        assert_eq!(
            queue
                .purge_key(&breakwater_core::ResourceKey::get("https://g.example/4"))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn test_drain_replays_in_fifo_order() {
        let fetcher = MockFetcher::new();
        let first = data_request("https://g.example/first");
        let second = data_request("https://g.example/second");
        fetcher.script(&first.key(), vec![Ok(ok_response(b"1"))]);
        fetcher.script(&second.key(), vec![Ok(ok_response(b"2"))]);

        let queue = queue(10, 60_000);
        queue.enqueue(first.clone()).await;
        queue.enqueue(second.clone()).await;

        let handler = DirectHandler::new(StdArc::new(fetcher.clone()));
        let processed = queue.drain(&handler).await;

        assert_eq!(processed, 2);
        assert!(queue.is_empty().await);
        assert_eq!(fetcher.call_order(), vec![first.key(), second.key()]);
        assert_eq!(fetcher.calls_for(&first.key()), 1);
        assert_eq!(fetcher.calls_for(&second.key()), 1);
    }

    #[tokio::test]
    async fn test_expired_items_are_dropped_not_replayed() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/stale");

        let queue = queue(10, 1);
        queue.enqueue(request).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let handler = DirectHandler::new(StdArc::new(fetcher.clone()));
        let processed = queue.drain(&handler).await;

        assert_eq!(processed, 0);
        assert_eq!(fetcher.total_calls(), 0);
        assert_eq!(queue.stats().await.dropped_count, 1);
    }

    #[tokio::test]
    async fn test_failed_replay_is_requeued_while_fresh() {
        let fetcher = MockFetcher::new();
        let request = data_request("https://g.example/flaky");
        fetcher.script(
            &request.key(),
            vec![Err(breakwater_core::FetchError::Connection(
                "still down".to_string(),
            ))],
        );

        let queue = queue(10, 60_000);
        queue.enqueue(request).await;

        let handler = DirectHandler::new(StdArc::new(fetcher));
        let processed = queue.drain(&handler).await;

        assert_eq!(processed, 0);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_key_removes_matching_items() {
        let queue = queue(10, 60_000);
        let request = data_request("https://g.example/game/7");
        queue.enqueue(request.clone()).await;
        queue.enqueue(data_request("https://g.example/other")).await;

        assert_eq!(queue.purge_key(&request.key()).await, 1);
        assert_eq!(queue.len().await, 1);
    }
}
