//! Hot Snapshot Index
//!
//! In-memory cache over the disk store using Moka, so repeated lookups of
//! the same entry skip disk entirely. Tracks hit/miss counters for the
//! status surface.

use std::sync::atomic::{AtomicU64, Ordering};

use moka::sync::Cache;
use tracing::{debug, trace};

use super::snapshot::ResponseSnapshot;
use super::CacheStats;

/// Maximum number of snapshots kept hot in memory
const MAX_HOT_ENTRIES: u64 = 1024;

/// In-memory index of recently served snapshots, keyed by request
/// identity (`RequestKey::index_key`).
pub struct SnapshotIndex {
    /// Hot snapshots by index key
    entries: Cache<String, ResponseSnapshot>,
    /// Cache hit counter
    hits: AtomicU64,
    /// Cache miss counter
    misses: AtomicU64,
}

impl SnapshotIndex {
    /// Create an index with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_HOT_ENTRIES)
    }

    /// Create an index with a custom capacity
    pub fn with_capacity(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .name("snapshot_index")
            .build();

        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a snapshot by index key, updating hit/miss counters
    pub fn get(&self, key: &str) -> Option<ResponseSnapshot> {
        match self.entries.get(key) {
            Some(snapshot) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = key, "Index HIT");
                Some(snapshot)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(key = key, "Index MISS");
                None
            }
        }
    }

    /// Insert or overwrite a snapshot (last write wins)
    pub fn insert(&self, key: String, snapshot: ResponseSnapshot) {
        self.entries.insert(key, snapshot);
    }

    /// Drop a single entry
    pub fn invalidate(&self, key: &str) {
        self.entries.invalidate(key);
    }

    /// Drop every entry. Called when a generation is deleted, since the
    /// index does not record which generation an entry came from.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        debug!("Cleared snapshot index");
    }

    /// Hit/miss counters since startup
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for SnapshotIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(body: &[u8]) -> ResponseSnapshot {
        ResponseSnapshot::new(200, vec![], body.to_vec())
    }

    #[test]
    fn test_index_hit_miss_counters() {
        let index = SnapshotIndex::new();

        assert!(index.get("GET https://example.com/").is_none());
        index.insert("GET https://example.com/".to_string(), snapshot(b"hello"));
        assert!(index.get("GET https://example.com/").is_some());

        let stats = index.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_index_clear_drops_entries() {
        let index = SnapshotIndex::new();
        index.insert("a".to_string(), snapshot(b"1"));
        index.insert("b".to_string(), snapshot(b"2"));

        index.clear();

        assert!(index.get("a").is_none());
        assert!(index.get("b").is_none());
    }

    #[test]
    fn test_index_overwrite_last_write_wins() {
        let index = SnapshotIndex::new();
        index.insert("a".to_string(), snapshot(b"old"));
        index.insert("a".to_string(), snapshot(b"new"));

        assert_eq!(index.get("a").unwrap().body, b"new");
    }
}
