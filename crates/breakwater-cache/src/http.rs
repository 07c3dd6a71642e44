//! reqwest-backed resource fetcher.

use async_trait::async_trait;
use breakwater_core::{
    FetchError, HttpMethod, ReachabilityProbe, ResourceFetcher, ResourceRequest, ResourceResponse,
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP implementation of [`ResourceFetcher`].
///
/// Also serves as the reachability probe: a resource is considered
/// reachable when a HEAD request to it succeeds.
#[derive(Debug, Clone)]
pub struct HttpResourceFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpResourceFetcher {
    /// Create a fetcher with the given per-request deadline
    pub fn new(timeout: Duration) -> Self {
        // Create a reqwest client with reasonable defaults
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, timeout }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn map_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if error.is_connect() {
            FetchError::Connection(error.to_string())
        } else {
            FetchError::Aborted(error.to_string())
        }
    }
}

impl Default for HttpResourceFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, FetchError> {
        debug!("fetching {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(e))?
            .to_vec();

        Ok(ResourceResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpResourceFetcher {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("reachability probe for {} failed: {}", url, e);
                false
            }
        }
    }
}
