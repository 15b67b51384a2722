//! Namespaced persisted storage.
//!
//! A [`LocalStore`] is a flat string-to-string store shared by any number of
//! caches. Each [`NamespacedStorage`] writes JSON records under its own key
//! prefix and finds its keys by filtering the full key set, so enumeration
//! costs O(total keys in the store), not O(keys in the namespace).

use std::collections::BTreeMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::Storage;

/// Prefix shared by every namespaced key: `cache-storage.<namespace>.<key>`
pub const KEY_PREFIX: &str = "cache-storage";

// == Local Store ==
/// Shared string store, optionally backed by a JSON file.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Creates a store that lives only in memory. `save` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a file-backed store, loading the file if it exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let entries: BTreeMap<String, String> = if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            };
            info!(path = %path.display(), count = entries.len(), "Loaded persisted store");
            entries
        } else {
            debug!(path = %path.display(), "Persisted store not found, starting empty");
            BTreeMap::new()
        };

        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            path: Some(path),
        })
    }

    // == Save ==
    /// Writes the whole store to its file.
    ///
    /// The file is replaced atomically via a sibling temp file.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = {
            let entries = self.entries.read();
            serde_json::to_string_pretty(&*entries)?
        };

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), "Persisted store saved");
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    pub fn remove_item(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }

    /// Every key in the store, across all namespaces.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

// == Namespaced Storage ==
/// Storage backend that keeps JSON-encoded records in a [`LocalStore`] under
/// a per-instance prefix.
#[derive(Debug, Clone)]
pub struct NamespacedStorage<T> {
    store: LocalStore,
    prefix: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> NamespacedStorage<T> {
    pub fn new(store: LocalStore, namespace: &str) -> Self {
        Self {
            store,
            prefix: format!("{}.{}.", KEY_PREFIX, namespace),
            _record: PhantomData,
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl<T: DeserializeOwned> NamespacedStorage<T> {
    fn decode(&self, key: &str, raw: &str) -> Option<T> {
        match serde_json::from_str(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, prefix = %self.prefix, error = %e, "Dropping undecodable record");
                None
            }
        }
    }
}

impl<T: Serialize + DeserializeOwned> Storage<T> for NamespacedStorage<T> {
    fn get(&self, key: &str) -> Option<T> {
        let raw = self.store.get_item(&self.full_key(key))?;
        self.decode(key, &raw)
    }

    fn set(&mut self, key: &str, value: T) -> Result<()> {
        let raw = serde_json::to_string(&value)?;
        self.store.set_item(&self.full_key(key), raw);
        Ok(())
    }

    /// The raw entry is deleted even when its record cannot be decoded.
    fn remove(&mut self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.remove_item(&self.full_key(key)) else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!(key, prefix = %self.prefix, error = %e, "Removed undecodable record");
            e.into()
        })
    }

    fn size(&self) -> usize {
        self.keys().len()
    }

    fn keys(&self) -> Vec<String> {
        self.store
            .keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[test]
    fn test_namespaced_key_layout() {
        let store = LocalStore::in_memory();
        let mut storage: NamespacedStorage<u32> = NamespacedStorage::new(store.clone(), "ns");

        storage.set("k", 7).unwrap();
        assert_eq!(store.keys(), vec!["cache-storage.ns.k".to_string()]);
    }

    #[test]
    fn test_namespaced_set_get_remove() {
        let store = LocalStore::in_memory();
        let mut storage: NamespacedStorage<Vec<u32>> = NamespacedStorage::new(store.clone(), "a");

        storage.set("k", vec![1, 2, 3]).unwrap();
        assert_eq!(storage.get("k"), Some(vec![1, 2, 3]));
        assert_eq!(store.get_item("cache-storage.a.k").as_deref(), Some("[1,2,3]"));

        assert_eq!(storage.remove("k").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(storage.remove("k").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = LocalStore::in_memory();
        let mut a: NamespacedStorage<u32> = NamespacedStorage::new(store.clone(), "a");
        let mut b: NamespacedStorage<u32> = NamespacedStorage::new(store.clone(), "b");

        a.set("x", 1).unwrap();
        a.set("y", 2).unwrap();
        b.set("x", 10).unwrap();
        store.set_item("unrelated", "raw".to_string());

        let mut keys = a.keys();
        keys.sort();
        assert_eq!(keys, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(a.size(), 2);
        assert_eq!(b.size(), 1);
        assert_eq!(b.get("x"), Some(10));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_undecodable_record_is_absent() {
        let store = LocalStore::in_memory();
        let storage: NamespacedStorage<u32> = NamespacedStorage::new(store.clone(), "a");

        store.set_item("cache-storage.a.bad", "not json".to_string());
        assert_eq!(storage.get("bad"), None);
        assert_eq!(storage.size(), 1);
    }

    #[test]
    fn test_remove_undecodable_record_deletes_entry() {
        let store = LocalStore::in_memory();
        let mut storage: NamespacedStorage<u32> = NamespacedStorage::new(store.clone(), "a");

        store.set_item("cache-storage.a.bad", "not json".to_string());
        assert!(matches!(storage.remove("bad"), Err(CacheError::Serialization(_))));
        assert!(store.is_empty());
        assert_eq!(storage.remove("bad").unwrap(), None);
    }

    #[test]
    fn test_set_unencodable_record_stores_nothing() {
        use std::collections::HashMap;

        let store = LocalStore::in_memory();
        let mut storage: NamespacedStorage<HashMap<(u8, u8), u8>> =
            NamespacedStorage::new(store.clone(), "a");

        // JSON object keys must be strings
        let record = HashMap::from([((1, 2), 3)]);
        assert!(matches!(storage.set("k", record), Err(CacheError::Serialization(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_local_store_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = LocalStore::open(&path).unwrap();
        assert!(store.is_empty());
        let mut storage: NamespacedStorage<String> = NamespacedStorage::new(store.clone(), "ns");
        storage.set("greeting", "hello".to_string()).unwrap();
        store.save().unwrap();

        let reopened = LocalStore::open(&path).unwrap();
        let storage: NamespacedStorage<String> = NamespacedStorage::new(reopened, "ns");
        assert_eq!(storage.get("greeting").as_deref(), Some("hello"));
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let store = LocalStore::in_memory();
        store.set_item("k", "v".to_string());
        assert!(store.save().is_ok());
        assert_eq!(store.len(), 1);
    }
}
