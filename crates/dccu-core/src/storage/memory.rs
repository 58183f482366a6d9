//! In-process key-value store.

use dashmap::DashMap;

use crate::error::CoreResult;

use super::KvStore;

/// Key-value store held in memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn load(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn save(&self, key: &str, value: &[u8]) -> CoreResult<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
