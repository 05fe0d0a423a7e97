//! Cache Middleware
//!
//! Installs the response cache ahead of axum handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::cache::ResponseCache;

/// Middleware for `axum::middleware::from_fn_with_state`.
///
/// Replays cached responses without calling `next`; on a miss runs the rest
/// of the stack and caches what it produced.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(cache.clone(), cache_middleware));
/// ```
pub async fn cache_middleware(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    cache.serve(request, |request| next.run(request)).await
}
