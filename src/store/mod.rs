//! Cache generation storage
//!
//! A generation is a named, persistent map from request identity to
//! response snapshot, tied to one deployed version. Generations are
//! created whole at install time, superseded (never mutated in place) on
//! redeploy, and deleted whole when pruned.

pub mod disk;
pub mod index;
pub mod memory;
pub mod snapshot;

use std::path::PathBuf;

pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use snapshot::{RequestKey, ResponseSnapshot};

/// Errors from the cache storage layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Cache store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot metadata encoding failed: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("Corrupt cache entry at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Hit/miss counters exposed on the status surface
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Storage handle shared by the lifecycle manager and the interception
/// policy. Implementations must serialize concurrent writes to the same
/// key safely (last write wins on identical identity).
pub trait CacheStore: Send + Sync {
    /// Open (create if absent) a named generation
    fn open_generation(&self, name: &str) -> Result<(), StoreError>;

    /// Names of every persisted generation
    fn list_generations(&self) -> Result<Vec<String>, StoreError>;

    /// Delete a generation and all of its entries
    fn delete_generation(&self, name: &str) -> Result<(), StoreError>;

    /// Insert or overwrite one entry in a generation
    fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        snapshot: &ResponseSnapshot,
    ) -> Result<(), StoreError>;

    /// Look up an entry in any visible generation
    fn get(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, StoreError>;

    /// All-or-nothing batch insert: if any entry fails to store, the
    /// generation is left without any of the batch (no partial commit)
    fn commit_batch(
        &self,
        generation: &str,
        entries: &[(RequestKey, ResponseSnapshot)],
    ) -> Result<(), StoreError>;

    /// Lookup hit/miss counters since startup
    fn stats(&self) -> CacheStats;
}
