//! In-memory storage backend.

use std::collections::HashMap;

use crate::error::Result;
use crate::storage::Storage;

// == Memory Storage ==
/// `HashMap` backed storage. Reads clone the stored record.
#[derive(Debug, Clone)]
pub struct MemoryStorage<T> {
    records: HashMap<String, T>,
}

impl<T> MemoryStorage<T> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<T> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Storage<T> for MemoryStorage<T> {
    fn get(&self, key: &str) -> Option<T> {
        self.records.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: T) -> Result<()> {
        self.records.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<Option<T>> {
        Ok(self.records.remove(key))
    }

    fn size(&self) -> usize {
        self.records.len()
    }

    fn keys(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }
}
