//! Gin Cache - HTTP response cache middleware
//!
//! Fingerprints GET requests, stores complete response snapshots in a
//! pluggable store (in-memory or RocksDB) and replays them until they expire.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::{cache_middleware, AppState};
pub use cache::{CacheEntry, CacheKey, ResponseCache};
pub use config::{CacheOptions, Config};
pub use error::CacheError;
pub use store::{DiskStore, MemoryStore, Store};
pub use tasks::spawn_sweep_task;
