//! Disk-backed Cache Store
//!
//! Persists cache generations as directories under a store root. Each
//! entry is a JSON metadata sidecar plus a raw body file, both written
//! atomically via tempfile-and-rename so a crash never leaves a torn
//! entry visible.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::index::SnapshotIndex;
use super::snapshot::{RequestKey, ResponseSnapshot, SnapshotMeta};
use super::{CacheStats, CacheStore, StoreError};

/// Disk layout:
///
/// ```text
/// <root>/<generation>/<sha1>.meta.json
/// <root>/<generation>/<sha1>.body
/// ```
pub struct DiskStore {
    /// Root directory holding one subdirectory per generation
    root: PathBuf,
    /// Hot in-memory index over recently served entries
    index: SnapshotIndex,
}

impl DiskStore {
    /// Create a store rooted at the platform cache directory
    pub fn new() -> Result<Self, StoreError> {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("offcache");
        Self::with_root(root)
    }

    /// Create a store rooted at an explicit directory
    pub fn with_root(root: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;

        info!(root = %root.display(), "Cache store initialized");

        Ok(Self {
            root,
            index: SnapshotIndex::new(),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn entry_paths(&self, generation: &str, key: &RequestKey) -> (PathBuf, PathBuf) {
        let id = key.storage_id();
        let dir = self.generation_dir(generation);
        (dir.join(format!("{}.meta.json", id)), dir.join(format!("{}.body", id)))
    }

    /// Atomically write `data` to `path` via a sibling temp file
    fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
        let parent = path.parent().unwrap_or(Path::new("/tmp"));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| StoreError::io(parent, e))?;

        tmp.write_all(data).map_err(|e| StoreError::io(path, e))?;

        tmp.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;

        Ok(())
    }

    /// Read one entry from a generation directory, invalidating it when
    /// the body file is missing or does not match the recorded length
    fn read_entry(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<ResponseSnapshot>, StoreError> {
        let (meta_path, body_path) = self.entry_paths(generation, key);

        if !meta_path.exists() {
            return Ok(None);
        }

        let meta_bytes = fs::read(&meta_path).map_err(|e| StoreError::io(&meta_path, e))?;
        let meta: SnapshotMeta = serde_json::from_slice(&meta_bytes)?;

        let body = match fs::read(&body_path) {
            Ok(body) if body.len() as u64 == meta.body_len => body,
            Ok(body) => {
                warn!(
                    url = %key.url,
                    stored = body.len(),
                    expected = meta.body_len,
                    "Cache entry body length mismatch, invalidating"
                );
                let _ = fs::remove_file(&meta_path);
                let _ = fs::remove_file(&body_path);
                return Ok(None);
            }
            Err(e) => {
                warn!(url = %key.url, error = %e, "Cache entry body unreadable, invalidating");
                let _ = fs::remove_file(&meta_path);
                return Ok(None);
            }
        };

        Ok(Some(ResponseSnapshot::new(meta.status, meta.headers, body)))
    }

    /// Remove every entry of a generation while keeping the directory,
    /// used to abandon a partially written batch
    fn clear_generation(&self, name: &str) -> Result<(), StoreError> {
        let dir = self.generation_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        self.index.clear();
        Ok(())
    }
}

impl CacheStore for DiskStore {
    fn open_generation(&self, name: &str) -> Result<(), StoreError> {
        let dir = self.generation_dir(name);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        debug!(generation = name, "Opened cache generation");
        Ok(())
    }

    fn list_generations(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let read_dir = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_generation(&self, name: &str) -> Result<(), StoreError> {
        let dir = self.generation_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        // Index entries do not record their generation, so drop them all
        self.index.clear();
        debug!(generation = name, "Deleted cache generation");
        Ok(())
    }

    fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        snapshot: &ResponseSnapshot,
    ) -> Result<(), StoreError> {
        self.open_generation(generation)?;

        let (meta_path, body_path) = self.entry_paths(generation, key);
        let meta = SnapshotMeta::from_parts(key, snapshot);
        let meta_bytes = serde_json::to_vec(&meta)?;

        // Body first: the sidecar's presence marks the entry complete
        Self::write_atomic(&body_path, &snapshot.body)?;
        Self::write_atomic(&meta_path, &meta_bytes)?;

        self.index.insert(key.index_key(), snapshot.clone());

        debug!(
            generation = generation,
            url = %key.url,
            status = snapshot.status,
            size = snapshot.body.len(),
            "Stored cache entry"
        );

        Ok(())
    }

    fn get(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, StoreError> {
        if let Some(snapshot) = self.index.get(&key.index_key()) {
            return Ok(Some(snapshot));
        }

        // Lookup is not restricted to the current generation: after
        // activation only one remains, but before pruning an entry from
        // any persisted generation is fair game.
        for generation in self.list_generations()? {
            if let Some(snapshot) = self.read_entry(&generation, key)? {
                self.index.insert(key.index_key(), snapshot.clone());
                return Ok(Some(snapshot));
            }
        }

        Ok(None)
    }

    fn commit_batch(
        &self,
        generation: &str,
        entries: &[(RequestKey, ResponseSnapshot)],
    ) -> Result<(), StoreError> {
        self.open_generation(generation)?;

        for (key, snapshot) in entries {
            if let Err(e) = self.put(generation, key, snapshot) {
                warn!(
                    generation = generation,
                    url = %key.url,
                    error = %e,
                    "Batch store failed, abandoning partial commit"
                );
                self.clear_generation(generation)?;
                return Err(e);
            }
        }

        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.index.stats()
    }
}
