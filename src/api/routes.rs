//! API Routes
//!
//! Configures the Axum router with the cached sample routes and the
//! uncached service endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{echo_handler, greet_handler, health_handler, stats_handler, AppState};
use super::middleware::cache_middleware;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /greet?name=` - Cached greeting
/// - `POST /echo` - Echo, never cached
/// - `GET /stats` - Cache statistics (uncached)
/// - `GET /health` - Health check endpoint (uncached)
///
/// # Middleware
/// - Cache: wraps only the sample routes
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cached = Router::new()
        .route("/greet", get(greet_handler))
        .route("/echo", post(echo_handler))
        .route_layer(middleware::from_fn_with_state(
            state.cache.clone(),
            cache_middleware,
        ));

    Router::new()
        .merge(cached)
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
