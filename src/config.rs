//! Configuration Module
//!
//! Handles loading server configuration from environment variables and the
//! cache options derived from it.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{DEFAULT_FINGERPRINT_HEADERS, DEFAULT_MAX_BODY_SIZE};

/// Which store backs the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    /// Process-lifetime map
    Memory,
    /// RocksDB database at the given directory
    Disk(PathBuf),
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache backend
    pub store: StoreKind,
    /// Entry lifetime in milliseconds, 0 = never expire
    pub ttl_ms: u64,
    /// Request headers folded into the fingerprint, in order
    pub headers: Vec<String>,
    /// Largest response body captured, in bytes
    pub max_body_size: usize,
    /// Expiry sweep interval in seconds, 0 = no sweep
    pub sweep_interval: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_STORE` - `memory` or `disk` (default: memory)
    /// - `CACHE_PATH` - RocksDB directory for the disk store (default: ./gin-cache-db)
    /// - `CACHE_TTL_MS` - Entry lifetime in milliseconds, 0 = never (default: 0)
    /// - `CACHE_HEADERS` - Comma-separated fingerprint headers
    ///   (default: User-Agent,Accept,Accept-Encoding,Accept-Language,Cookie)
    /// - `CACHE_MAX_BODY_BYTES` - Capture limit (default: 8 MiB)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds, 0 = off (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let store = match env::var("CACHE_STORE").ok().as_deref() {
            Some("disk") => StoreKind::Disk(
                env::var("CACHE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_disk_path()),
            ),
            _ => StoreKind::Memory,
        };

        Self {
            store,
            ttl_ms: parse_var("CACHE_TTL_MS").unwrap_or(defaults.ttl_ms),
            headers: env::var("CACHE_HEADERS")
                .ok()
                .map(|v| parse_header_list(&v))
                .unwrap_or(defaults.headers),
            max_body_size: parse_var("CACHE_MAX_BODY_BYTES").unwrap_or(defaults.max_body_size),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Cache engine options for this configuration.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions::default()
            .with_ttl(Duration::from_millis(self.ttl_ms))
            .with_headers(self.headers.clone())
            .with_max_body_size(self.max_body_size)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::Memory,
            ttl_ms: 0,
            headers: default_headers(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            sweep_interval: 0,
            server_port: 3000,
        }
    }
}

// == Cache Options ==
/// Tunables of the cache engine.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Entry lifetime, `Duration::ZERO` = never expire
    pub ttl: Duration,
    /// Request headers folded into the fingerprint, in order
    pub headers: Vec<String>,
    /// Responses with larger bodies pass through uncached
    pub max_body_size: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::ZERO,
            headers: default_headers(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl CacheOptions {
    /// Sets the entry lifetime; `Duration::ZERO` keeps entries forever.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replaces the request headers folded into the fingerprint.
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the largest response body, in bytes, that gets cached.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }
}

fn default_headers() -> Vec<String> {
    DEFAULT_FINGERPRINT_HEADERS
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn default_disk_path() -> PathBuf {
    PathBuf::from("./gin-cache-db")
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_header_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}
