//! Durable key-value backends.
//!
//! Stores speak to persistence through [`KvBackend`]: a string-keyed,
//! string-valued durable map. The shipped implementation is LMDB; an
//! in-memory variant backs tests and ephemeral runs.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::info;

use crate::config::MAP_SIZE;
use crate::error::{StoreError, StoreResult};

/// Durable string-keyed map every store is built on. Implementations are
/// shared behind `Arc`, so all methods take `&self`.
pub trait KvBackend: Send + Sync {
    /// Reads the value stored at `key`, if any.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes `value` at `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// LMDB-backed store: one environment, one unnamed database, one value per
/// collection key.
pub struct LmdbBackend {
    env: Environment,
    db: Database,
}

impl LmdbBackend {
    /// Opens (creating if needed) the environment at `path`, which must be a
    /// directory.
    pub fn open(path: &Path) -> StoreResult<Self> {
        fs::create_dir_all(path)
            .map_err(|e| StoreError::Backend(format!("create {}: {e}", path.display())))?;

        let env = Environment::new()
            .set_map_size(MAP_SIZE)
            .open(path)
            .map_err(|e| StoreError::Backend(format!("open {}: {e}", path.display())))?;
        let db = env
            .create_db(None, DatabaseFlags::empty())
            .map_err(|e| StoreError::Backend(format!("create database: {e}")))?;

        info!("Storage environment opened at {}", path.display());
        Ok(Self { env, db })
    }
}

impl KvBackend for LmdbBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let txn = self
            .env
            .begin_ro_txn()
            .map_err(|e| StoreError::StorageRead(format!("begin read txn: {e}")))?;
        match txn.get(self.db, &key) {
            Ok(bytes) => {
                let value = std::str::from_utf8(bytes)
                    .map_err(|e| StoreError::StorageRead(format!("value at {key} is not UTF-8: {e}")))?
                    .to_owned();
                Ok(Some(value))
            }
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(StoreError::StorageRead(format!("get {key}: {e}"))),
        }
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut txn = self
            .env
            .begin_rw_txn()
            .map_err(|e| StoreError::StorageWrite(format!("begin write txn: {e}")))?;
        txn.put(self.db, &key, &value, WriteFlags::empty())
            .map_err(|e| StoreError::StorageWrite(format!("put {key}: {e}")))?;
        txn.commit()
            .map_err(|e| StoreError::StorageWrite(format!("commit {key}: {e}")))
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut txn = self
            .env
            .begin_rw_txn()
            .map_err(|e| StoreError::StorageWrite(format!("begin write txn: {e}")))?;
        match txn.del(self.db, &key, None) {
            Ok(()) | Err(lmdb::Error::NotFound) => {}
            Err(e) => return Err(StoreError::StorageWrite(format!("del {key}: {e}"))),
        }
        txn.commit()
            .map_err(|e| StoreError::StorageWrite(format!("commit {key}: {e}")))
    }
}

/// HashMap-backed store for tests and ephemeral use. Nothing survives the
/// process.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_round_trips() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("k").unwrap(), None);

        backend.put("k", "v1").unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("v1"));

        backend.put("k", "v2").unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("v2"));

        backend.remove("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn memory_backend_remove_absent_key_is_noop() {
        let backend = MemoryBackend::new();
        backend.remove("missing").unwrap();
        backend.remove("missing").unwrap();
    }
}
