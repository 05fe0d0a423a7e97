//! API Handlers
//!
//! Sample handlers served behind the cache, plus the uncached stats and
//! health endpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::cache::ResponseCache;
use crate::config::{Config, StoreKind};
use crate::error::Result;
use crate::models::{EchoResponse, GreetQuery, GreetResponse, HealthResponse, StatsResponse};
use crate::store::{DiskStore, MemoryStore, Store};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Response cache engine
    pub cache: ResponseCache,
    /// Number of times a cached route's handler actually ran
    pub handler_runs: Arc<AtomicU64>,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: ResponseCache) -> Self {
        Self {
            cache,
            handler_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens the configured store and builds the engine over it.
    ///
    /// # Errors
    /// * `CacheError::Backend` - the disk store could not be opened
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn Store> = match &config.store {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::Disk(path) => Arc::new(DiskStore::open(path)?),
        };
        Ok(Self::new(ResponseCache::new(store, config.cache_options())))
    }

    fn count_run(&self) -> u64 {
        self.handler_runs.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Handler for GET /greet
///
/// Greets `name`; the run counter shows whether the handler executed or the
/// cache answered.
pub async fn greet_handler(
    State(state): State<AppState>,
    Query(query): Query<GreetQuery>,
) -> Json<GreetResponse> {
    let run = state.count_run();
    Json(GreetResponse::new(query.name(), run))
}

/// Handler for POST /echo
///
/// Returns the request body; POST requests always bypass the cache.
pub async fn echo_handler(State(state): State<AppState>, body: String) -> Json<EchoResponse> {
    let run = state.count_run();
    Json(EchoResponse::new(body, run))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheOptions;

    fn test_state() -> AppState {
        AppState::new(ResponseCache::new(
            Arc::new(MemoryStore::new()),
            CacheOptions::default(),
        ))
    }

    #[tokio::test]
    async fn test_greet_handler() {
        let state = test_state();

        let response = greet_handler(
            State(state.clone()),
            Query(GreetQuery {
                name: Some("ada".to_string()),
            }),
        )
        .await;
        assert_eq!(response.message, "Hello, ada!");
        assert_eq!(response.run, 1);
    }

    #[tokio::test]
    async fn test_echo_handler() {
        let state = test_state();

        let response = echo_handler(State(state.clone()), "ping".to_string()).await;
        assert_eq!(response.echo, "ping");
        assert_eq!(state.handler_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(test_state())).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[test]
    fn test_state_from_disk_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            store: StoreKind::Disk(dir.path().join("cache")),
            ..Config::default()
        };

        let state = AppState::from_config(&config).unwrap();
        assert!(state.cache.store().keys().unwrap().is_empty());
    }
}
