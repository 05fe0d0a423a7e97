//! In-Memory Store
//!
//! HashMap storage guarded by a single reader/writer lock. Entries live until
//! removed or the process exits.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{CacheError, Result};
use crate::store::{validate_key, Store};

// == Memory Store ==
/// Volatile store shared across request handlers.
///
/// Reads take the shared lock, writes the exclusive one. The lock is held
/// for a single map access, never across a request.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    // == Is Empty ==
    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Err(CacheError::AlreadyExists(key.to_string()));
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn update(&self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        match self.entries.write().get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.entries
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
