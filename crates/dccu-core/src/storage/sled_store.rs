//! Durable key-value store on sled.

use std::path::Path;

use crate::error::CoreResult;

use super::KvStore;

const LOCAL_TREE_NAME: &[u8] = b"dccu:local";

/// Key-value store persisted in a sled tree.
pub struct SledStore {
    tree: sled::Tree,
}

impl SledStore {
    /// Open the local tree in an existing database.
    pub fn open(db: &sled::Db) -> CoreResult<Self> {
        let tree = db.open_tree(LOCAL_TREE_NAME)?;
        Ok(Self { tree })
    }

    /// Open or create a database at `path` and use its local tree.
    pub fn open_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let db = sled::open(path)?;
        Self::open(&db)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> CoreResult<()> {
        self.tree.flush()?;
        Ok(())
    }
}

impl KvStore for SledStore {
    fn load(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn save(&self, key: &str, value: &[u8]) -> CoreResult<()> {
        self.tree.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<bool> {
        Ok(self.tree.remove(key.as_bytes())?.is_some())
    }
}
