//! Request Identity and Response Snapshots
//!
//! A cache entry is a (request identity -> response snapshot) pair. The
//! identity is method + URL; snapshots are immutable once stored.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Identity of a cacheable request: method plus absolute URL.
///
/// Only GET requests are ever cached, but the method is kept in the
/// identity so the disk key cannot collide across methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// Request method (uppercase, e.g. "GET")
    pub method: String,
    /// Absolute request URL
    pub url: String,
}

impl RequestKey {
    /// Create a key for an arbitrary method
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
        }
    }

    /// Create a GET key (the only method the cache ever stores)
    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    /// Lookup key used by the in-memory index
    pub fn index_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Stable disk name for this identity.
    ///
    /// SHA-1 of "METHOD URL" — a naming scheme only, not an integrity
    /// check of the stored bytes.
    pub fn storage_id(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A stored response: status, headers, and a full body copy.
///
/// The body is buffered once when the response is read off the network;
/// the copy kept in the cache and the copy returned to the caller are
/// clones of the same buffer, never two reads of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    /// HTTP status code
    pub status: u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Full response body
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    /// Create a snapshot from already-buffered parts
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Whether this snapshot is eligible for opportunistic caching
    /// (exactly 200 — redirects and other success-ish statuses are not)
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }
}

/// On-disk metadata sidecar for a stored snapshot.
///
/// The body lives next to it in a raw `.body` file; this JSON file holds
/// everything else, including the original identity for debuggability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    /// Request method of the stored identity
    pub method: String,
    /// Request URL of the stored identity
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Body length in bytes (must match the body file)
    pub body_len: u64,
}

impl SnapshotMeta {
    /// Build the sidecar for a key/snapshot pair
    pub fn from_parts(key: &RequestKey, snapshot: &ResponseSnapshot) -> Self {
        Self {
            method: key.method.clone(),
            url: key.url.clone(),
            status: snapshot.status,
            headers: snapshot.headers.clone(),
            body_len: snapshot.body.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_id_is_stable() {
        let a = RequestKey::get("https://example.com/app.js");
        let b = RequestKey::get("https://example.com/app.js");
        assert_eq!(a.storage_id(), b.storage_id());
        assert_eq!(a.storage_id().len(), 40); // sha1 hex
    }

    #[test]
    fn test_storage_id_differs_by_url_and_method() {
        let a = RequestKey::get("https://example.com/a");
        let b = RequestKey::get("https://example.com/b");
        let c = RequestKey::new("HEAD", "https://example.com/a");
        assert_ne!(a.storage_id(), b.storage_id());
        assert_ne!(a.storage_id(), c.storage_id());
    }

    #[test]
    fn test_method_is_normalized() {
        let key = RequestKey::new("get", "https://example.com/");
        assert_eq!(key.method, "GET");
        assert_eq!(key.index_key(), "GET https://example.com/");
    }

    #[test]
    fn test_only_exact_200_is_cacheable() {
        assert!(ResponseSnapshot::new(200, vec![], vec![]).is_cacheable());
        assert!(!ResponseSnapshot::new(204, vec![], vec![]).is_cacheable());
        assert!(!ResponseSnapshot::new(301, vec![], vec![]).is_cacheable());
        assert!(!ResponseSnapshot::new(404, vec![], vec![]).is_cacheable());
    }
}
