//! In-memory Cache Store
//!
//! Test double for the storage handle. Holds everything in a map and can
//! be told to fail deletion of specific generations, which is how the
//! pruning-isolation path gets exercised.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::snapshot::{RequestKey, ResponseSnapshot};
use super::{CacheStats, CacheStore, StoreError};

/// In-memory implementation of [`CacheStore`]
#[derive(Default)]
pub struct MemoryStore {
    /// Generation name -> (index key -> snapshot)
    generations: Mutex<BTreeMap<String, HashMap<String, ResponseSnapshot>>>,
    /// Generations whose deletion is forced to fail
    fail_deletes: Mutex<HashSet<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force `delete_generation(name)` to fail from now on
    pub fn fail_delete_of(&self, name: &str) {
        self.fail_deletes.lock().unwrap().insert(name.to_string());
    }

    /// Number of entries in a generation (0 when absent)
    pub fn entry_count(&self, generation: &str) -> usize {
        self.generations
            .lock()
            .unwrap()
            .get(generation)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

impl CacheStore for MemoryStore {
    fn open_generation(&self, name: &str) -> Result<(), StoreError> {
        self.generations
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    fn list_generations(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.generations.lock().unwrap().keys().cloned().collect())
    }

    fn delete_generation(&self, name: &str) -> Result<(), StoreError> {
        if self.fail_deletes.lock().unwrap().contains(name) {
            return Err(StoreError::io(
                PathBuf::from(name),
                io::Error::new(io::ErrorKind::PermissionDenied, "injected delete failure"),
            ));
        }
        self.generations.lock().unwrap().remove(name);
        Ok(())
    }

    fn put(
        &self,
        generation: &str,
        key: &RequestKey,
        snapshot: &ResponseSnapshot,
    ) -> Result<(), StoreError> {
        self.generations
            .lock()
            .unwrap()
            .entry(generation.to_string())
            .or_default()
            .insert(key.index_key(), snapshot.clone());
        Ok(())
    }

    fn get(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, StoreError> {
        let generations = self.generations.lock().unwrap();
        for entries in generations.values() {
            if let Some(snapshot) = entries.get(&key.index_key()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(snapshot.clone()));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    fn commit_batch(
        &self,
        generation: &str,
        entries: &[(RequestKey, ResponseSnapshot)],
    ) -> Result<(), StoreError> {
        self.open_generation(generation)?;
        for (key, snapshot) in entries {
            self.put(generation, key, snapshot)?;
        }
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_delete_failure() {
        let store = MemoryStore::new();
        store.open_generation("v1").unwrap();
        store.fail_delete_of("v1");

        assert!(store.delete_generation("v1").is_err());
        assert_eq!(store.list_generations().unwrap(), vec!["v1"]);
    }

    #[test]
    fn test_get_spans_generations() {
        let store = MemoryStore::new();
        let key = RequestKey::get("https://example.com/");
        store
            .put("v1", &key, &ResponseSnapshot::new(200, vec![], b"x".to_vec()))
            .unwrap();
        store.open_generation("v2").unwrap();

        assert!(store.get(&key).unwrap().is_some());
    }
}
