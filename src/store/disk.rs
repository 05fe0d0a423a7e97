//! Disk Store
//!
//! RocksDB adapter for cache entries that must survive restarts.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::info;

use crate::cache::KEY_PREFIX;
use crate::error::{CacheError, Result};
use crate::store::{validate_key, Store};

// == Disk Store ==
/// Persistent store over an ordered log-structured key/value engine.
///
/// The database may hold data outside the cache namespace; `keys` only
/// reports entries under `gin:cache:`.
///
/// Cloning is cheap, clones share the same database handle.
#[derive(Clone)]
pub struct DiskStore {
    db: Arc<DB>,
    /// Serializes presence checks with the write that depends on them.
    write_lock: Arc<Mutex<()>>,
}

impl DiskStore {
    /// Opens the database at `path`, creating the directory if needed.
    ///
    /// # Errors
    /// * `CacheError::Backend` - RocksDB could not open the directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path.as_ref())?;
        info!("Disk store opened at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Forces buffered writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.db.get_pinned(key.as_bytes())?.is_some())
    }
}

impl Store for DiskStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        self.db
            .get(key.as_bytes())?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();
        if self.contains(key)? {
            return Err(CacheError::AlreadyExists(key.to_string()));
        }
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    fn update(&self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();
        if !self.contains(key)? {
            return Err(CacheError::NotFound(key.to_string()));
        }

        // Delete and put land in the log as one record.
        let mut batch = WriteBatch::default();
        batch.delete(key.as_bytes());
        batch.put(key.as_bytes(), value);
        self.db.write(batch)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();
        if !self.contains(key)? {
            return Err(CacheError::NotFound(key.to_string()));
        }
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let prefix = KEY_PREFIX.as_bytes();
        let mut keys = Vec::new();

        for item in self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if let Ok(key) = String::from_utf8(key.into_vec()) {
                keys.push(key);
            }
        }

        Ok(keys)
    }
}
