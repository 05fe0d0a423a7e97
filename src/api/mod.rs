//! API Module
//!
//! HTTP surface of the demo server: cache middleware, handlers and routing.
//!
//! # Endpoints
//! - `GET /greet?name=` - Cached greeting
//! - `POST /echo` - Echo, bypasses the cache
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::cache_middleware;
pub use routes::create_router;
