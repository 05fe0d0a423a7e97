//! Store Module
//!
//! Byte-oriented key/value persistence behind the response cache.
//!
//! # Backends
//! - `MemoryStore`: process-lifetime map guarded by a reader/writer lock
//! - `DiskStore`: RocksDB-backed, survives restarts

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::error::{CacheError, Result};

// == Store Trait ==
/// Storage contract used by the cache engine.
///
/// Values are opaque to the store. `set` is create-only and `update` is
/// overwrite-only, so a caller racing another writer sees `AlreadyExists`
/// instead of silently clobbering its value.
///
/// Calls are synchronous and run on the async worker that serves the request.
/// Point operations (`get`, `set`, `update`, `remove`) must stay fast and
/// bounded, as an in-process map or a local RocksDB lookup is. `keys` scans
/// the whole namespace and belongs off the request path.
pub trait Store: Send + Sync {
    /// Returns the exact bytes stored under `key`, or `NotFound`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Creates `key`, failing with `AlreadyExists` when it is present.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Overwrites an existing `key`, failing with `NotFound` when absent.
    fn update(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Deletes `key`, failing with `NotFound` when absent.
    fn remove(&self, key: &str) -> Result<()>;

    /// Lists every key currently present. Not meant for hot paths.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Rejects empty keys before they reach a backend.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    Ok(())
}
