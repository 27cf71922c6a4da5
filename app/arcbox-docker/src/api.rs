//! Docker API router.
//!
//! Implements the host-side subset of Docker Engine API v1.43 routing.
//! See: https://docs.docker.com/engine/api/v1.43/

use crate::handlers;
use crate::trace::trace_id_middleware;
use arcbox_core::Runtime;
use axum::{Router, middleware, routing::get};
use std::sync::Arc;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// ArcBox runtime.
    pub runtime: Arc<Runtime>,
}

/// Creates the Docker API router with all endpoints.
#[must_use]
pub fn create_router(runtime: Arc<Runtime>) -> Router {
    let state = AppState { runtime };

    let mut router = api_routes();
    for minor in 24..=43 {
        router = router.nest(&format!("/v1.{minor}"), api_routes());
    }

    router
        .layer(middleware::from_fn(trace_id_middleware))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/version", get(handlers::get_version))
        .route("/_ping", get(handlers::ping).head(handlers::ping))
        .route("/system/df", get(handlers::disk_usage))
}
