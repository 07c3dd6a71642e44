//! Seam traits between the caching, recovery and supervision layers.
//!
//! Every component consumes these as trait objects so implementations can
//! be swapped out in tests and hosts can inject their own transport.

use crate::error::{FetchError, RequestFailure};
use crate::types::{ResourceKey, ResourceRequest, ResourceResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Transport used to fetch resources from the network.
///
/// An HTTP response of any status is an `Ok`; errors are reserved for
/// transport-level failures (timeouts, dropped connections).
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, FetchError>;
}

/// A request pipeline stage producing a success response or a classified
/// failure. The cache strategy engine implements this; the recovery engine
/// wraps any implementation with retry and fallback handling.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn execute(&self, request: &ResourceRequest)
        -> Result<ResourceResponse, RequestFailure>;
}

/// Read-side view of the cache used for failure fallbacks.
///
/// Lookups are best effort: storage errors and stale entries both read as
/// absent.
#[async_trait]
pub trait CacheReader: Send + Sync {
    async fn cached(&self, key: &ResourceKey) -> Option<ResourceResponse>;
}

/// Lightweight existence check used to verify a resource is still worth
/// retrying.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Adapter exposing a bare [`ResourceFetcher`] as a [`RequestHandler`].
///
/// Non-2xx responses are reported as failures so the recovery engine can
/// classify them.
pub struct DirectHandler {
    fetcher: Arc<dyn ResourceFetcher>,
}

impl DirectHandler {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl RequestHandler for DirectHandler {
    async fn execute(
        &self,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, RequestFailure> {
        let response = self.fetcher.fetch(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(RequestFailure::HttpStatus(response.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceCategory;

    struct FixedFetcher {
        status: u16,
    }

    #[async_trait]
    impl ResourceFetcher for FixedFetcher {
        async fn fetch(
            &self,
            _request: &ResourceRequest,
        ) -> Result<ResourceResponse, FetchError> {
            Ok(ResourceResponse::with_status(self.status))
        }
    }

    #[tokio::test]
    async fn test_direct_handler_passes_success_through() {
        let handler = DirectHandler::new(Arc::new(FixedFetcher { status: 204 }));
        let request = ResourceRequest::get("https://g.example/ok", ResourceCategory::Data);
        let response = handler.execute(&request).await.unwrap();
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn test_direct_handler_reports_non_success_as_failure() {
        let handler = DirectHandler::new(Arc::new(FixedFetcher { status: 500 }));
        let request = ResourceRequest::get("https://g.example/broken", ResourceCategory::Data);
        let failure = handler.execute(&request).await.unwrap_err();
        assert_eq!(failure, RequestFailure::HttpStatus(500));
    }
}
