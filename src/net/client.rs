//! Network Client
//!
//! Thin reqwest wrapper that turns a live response into an immutable
//! [`ResponseSnapshot`]. The body is buffered exactly once; the copy the
//! cache keeps and the copy the caller gets are clones of that buffer.
//!
//! There is no retry here: every failure is terminal for that single
//! fetch, and requests that can be satisfied from cache never reach this
//! module at all.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::store::{RequestKey, ResponseSnapshot};

use super::errors::FetchError;

/// HTTP client timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP fetcher for cache misses and manifest pre-caching
#[derive(Clone)]
pub struct NetworkClient {
    http_client: Client,
}

impl NetworkClient {
    /// Create a client with the default timeout
    pub fn new() -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FetchError::from_reqwest)?;

        Ok(Self { http_client })
    }

    /// Fetch a resource and buffer it into a snapshot
    ///
    /// # Arguments
    /// * `key` - Request identity (GET + absolute URL)
    /// * `headers` - Request headers to forward to the origin
    ///
    /// Any HTTP status comes back as `Ok`; only transport failures are
    /// errors.
    pub async fn fetch(
        &self,
        key: &RequestKey,
        headers: &[(String, String)],
    ) -> Result<ResponseSnapshot, FetchError> {
        debug!(url = %key.url, "Fetching from network");

        let mut request = self.http_client.get(&key.url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(FetchError::from_reqwest)?;

        let status = response.status().as_u16();
        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // Single buffered read of the body stream
        let body = response
            .bytes()
            .await
            .map_err(FetchError::from_reqwest)?
            .to_vec();

        debug!(url = %key.url, status = status, size = body.len(), "Network fetch complete");

        Ok(ResponseSnapshot::new(status, response_headers, body))
    }
}
