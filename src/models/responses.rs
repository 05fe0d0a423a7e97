//! Response DTOs for the demo API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for GET /greet
#[derive(Debug, Clone, Serialize)]
pub struct GreetResponse {
    /// Greeting text
    pub message: String,
    /// Handler invocation number that produced this body
    pub run: u64,
    /// When the handler produced this body, ISO 8601
    pub generated_at: String,
}

impl GreetResponse {
    /// Creates a new GreetResponse stamped with the current time
    pub fn new(name: &str, run: u64) -> Self {
        Self {
            message: format!("Hello, {}!", name),
            run,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for POST /echo
#[derive(Debug, Clone, Serialize)]
pub struct EchoResponse {
    /// The request body, unchanged
    pub echo: String,
    /// Handler invocation number that produced this body
    pub run: u64,
}

impl EchoResponse {
    /// Creates a new EchoResponse
    pub fn new(echo: impl Into<String>, run: u64) -> Self {
        Self {
            echo: echo.into(),
            run,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of expired entries evicted
    pub expired: u64,
    /// Number of requests that bypassed the cache
    pub bypassed: u64,
    /// Number of absorbed cache failures
    pub errors: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            expired: stats.expired,
            bypassed: stats.bypassed,
            errors: stats.errors,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
