//! Interception Policy
//!
//! Cache-first with network fallback and dynamic populate. Fires once per
//! outgoing request from a controlled context; the lookup always precedes
//! network issuance, and a cached entry is served even if stale (there is
//! no freshness check in this design).

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::net::{FetchError, NetworkClient};
use crate::store::{CacheStore, RequestKey, ResponseSnapshot};

/// Where the served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
    Fallback,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Network => "network",
            Source::Fallback => "fallback",
        }
    }
}

/// Per-request decision result
#[derive(Debug)]
pub enum Outcome {
    /// A response was produced, from cache, network, or the offline
    /// fallback
    Response {
        snapshot: ResponseSnapshot,
        source: Source,
    },
    /// The request is not eligible for interception; default handling
    /// applies, with no cache interaction of any kind
    Passthrough,
    /// No cache hit and the network fetch failed; the caller observes a
    /// failed fetch
    Failed(FetchError),
}

/// Cache-first interception policy for one active generation
pub struct InterceptPolicy {
    store: Arc<dyn CacheStore>,
    net: NetworkClient,
    /// Generation new entries are written into
    generation: String,
    /// Optional pre-cached substitute served when the network fails
    offline_fallback: Option<String>,
}

impl InterceptPolicy {
    pub fn new(
        store: Arc<dyn CacheStore>,
        net: NetworkClient,
        generation: String,
        offline_fallback: Option<String>,
    ) -> Self {
        Self {
            store,
            net,
            generation,
            offline_fallback,
        }
    }

    /// Whether a request qualifies for interception: exactly GET, and an
    /// absolute network-addressable URL (internal pseudo-protocol
    /// requests are ignored)
    pub fn is_eligible(method: &str, url: &str) -> bool {
        method == "GET" && url.starts_with("http")
    }

    /// Decide one request: cache lookup, then network, then conditional
    /// populate
    pub async fn handle(&self, method: &str, url: &str, headers: &[(String, String)]) -> Outcome {
        if !Self::is_eligible(method, url) {
            debug!(method = method, url = url, "Request not eligible, passing through");
            return Outcome::Passthrough;
        }

        let key = RequestKey::get(url);

        match self.store.get(&key) {
            Ok(Some(snapshot)) => {
                debug!(url = url, "Cache HIT");
                return Outcome::Response {
                    snapshot,
                    source: Source::Cache,
                };
            }
            Ok(None) => {
                debug!(url = url, "Cache MISS, fetching from network");
            }
            Err(e) => {
                // A broken store degrades to network-only behavior
                warn!(url = url, error = %e, "Cache lookup failed, falling back to network");
            }
        }

        match self.net.fetch(&key, headers).await {
            Ok(snapshot) => {
                if snapshot.is_cacheable() {
                    // Independent copy for the cache; the original goes
                    // back to the caller
                    if let Err(e) = self.store.put(&self.generation, &key, &snapshot) {
                        warn!(url = url, error = %e, "Failed to cache network response");
                    }
                }
                Outcome::Response {
                    snapshot,
                    source: Source::Network,
                }
            }
            Err(e) => {
                error!(url = url, error = %e, "Network fetch failed with no cache entry");
                self.offline_substitute().unwrap_or(Outcome::Failed(e))
            }
        }
    }

    /// Extension point: serve the pre-cached offline fallback, when one
    /// is configured and present in the cache
    fn offline_substitute(&self) -> Option<Outcome> {
        let url = self.offline_fallback.as_deref()?;
        match self.store.get(&RequestKey::get(url)) {
            Ok(Some(snapshot)) => {
                debug!(url = url, "Serving offline fallback");
                Some(Outcome::Response {
                    snapshot,
                    source: Source::Fallback,
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!(url = url, error = %e, "Offline fallback lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_filter() {
        assert!(InterceptPolicy::is_eligible("GET", "https://example.com/"));
        assert!(InterceptPolicy::is_eligible("GET", "http://localhost:8080/a"));

        // Non-GET methods are never intercepted
        assert!(!InterceptPolicy::is_eligible("POST", "https://example.com/api"));
        assert!(!InterceptPolicy::is_eligible("PUT", "https://example.com/x"));
        // Method match is exact
        assert!(!InterceptPolicy::is_eligible("get", "https://example.com/"));
        // Internal pseudo-protocols are ignored
        assert!(!InterceptPolicy::is_eligible("GET", "chrome-extension://abc/x.js"));
        assert!(!InterceptPolicy::is_eligible("GET", "data:text/plain,hi"));
    }

    #[test]
    fn test_source_names() {
        assert_eq!(Source::Cache.as_str(), "cache");
        assert_eq!(Source::Network.as_str(), "network");
        assert_eq!(Source::Fallback.as_str(), "fallback");
    }
}
