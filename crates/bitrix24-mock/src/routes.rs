//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::{any, get, post};
use std::sync::Arc;

/// Creates the mock server router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // REST methods
        .route(
            "/rest/{user_id}/{token}/{method}",
            post(handlers::rest_method),
        )
        // Diagnostics
        .route("/echo", any(handlers::echo))
        .route("/slow/{ms}", get(handlers::slow))
        .route("/redirect", any(handlers::redirect))
        .route("/status/{code}", any(handlers::status))
        .with_state(state)
}
