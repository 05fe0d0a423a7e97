//! Error types for the response cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for stores, the entry codec and the cache engine.
///
/// `NotFound` and `AlreadyExists` are expected outcomes that drive the miss
/// and lost-race paths. The remaining variants are failures the engine
/// absorbs by serving the request uncached.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not present in the store
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Create-only write hit an existing key
    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    /// Store keys must be non-empty
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Stored bytes could not be turned back into a cache entry
    #[error("Decode failure: {0}")]
    Decode(String),

    /// A cache entry could not be serialized
    #[error("Encode failure: {0}")]
    Encode(String),

    /// The storage substrate failed
    #[error("Backend failure: {0}")]
    Backend(String),
}

impl CacheError {
    /// Returns true for the `NotFound` outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }

    /// Returns true for the `AlreadyExists` outcome.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CacheError::AlreadyExists(_))
    }
}

impl From<rocksdb::Error> for CacheError {
    fn from(err: rocksdb::Error) -> Self {
        CacheError::Backend(err.into_string())
    }
}

impl From<bincode::error::DecodeError> for CacheError {
    fn from(err: bincode::error::DecodeError) -> Self {
        CacheError::Decode(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for CacheError {
    fn from(err: bincode::error::EncodeError) -> Self {
        CacheError::Encode(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the response cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_predicates() {
        assert!(CacheError::NotFound("k".into()).is_not_found());
        assert!(!CacheError::NotFound("k".into()).is_already_exists());
        assert!(CacheError::AlreadyExists("k".into()).is_already_exists());
        assert!(!CacheError::Backend("disk".into()).is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = CacheError::Decode("unknown codec version 9".into());
        assert_eq!(err.to_string(), "Decode failure: unknown codec version 9");
    }
}
