//! Web API router construction.

use crate::state::AppState;
use crate::web::{pricing, status};
use axum::{Router, routing::get};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Creates the web server router.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/pricing", get(pricing::get_rate))
        .route("/health", get(status::health))
        .with_state(app_state)
        // Generous outer bound; every inner operation carries its own
        // deadline (upstream 5s, lock wait 5s).
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
