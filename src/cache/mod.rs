//! Cache Module
//!
//! Response caching engine: entry codec, request fingerprinting, expiry and
//! the replay/capture flow.

mod engine;
mod entry;
mod key;
mod stats;


// Re-export public types
pub use engine::{ResponseCache, CACHE_STATUS_HEADER};
pub use entry::{CacheEntry, CODEC_VERSION};
pub use key::{CacheKey, Fingerprinter, DEFAULT_FINGERPRINT_HEADERS, KEY_PREFIX};
pub use stats::CacheStats;

// == Public Constants ==
/// Default cap on buffered response bodies in bytes
pub const DEFAULT_MAX_BODY_SIZE: usize = 8 * 1024 * 1024; // 8 MiB
