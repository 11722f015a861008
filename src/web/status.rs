//! Health handler.

use crate::state::AppState;
use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};
use tracing::trace;

/// Health check endpoint: liveness plus a shared-store ping and the
/// current breaker state, so operators can tell a degraded instance from
/// a dead one.
pub(super) async fn health(State(state): State<AppState>) -> Json<Value> {
    trace!("health check requested");
    let store_ok = state.store.ping().await.is_ok();
    Json(json!({
        "status": if store_ok { "healthy" } else { "degraded" },
        "store": if store_ok { "reachable" } else { "unreachable" },
        "breaker": state.breaker.state().as_str(),
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("GIT_COMMIT_SHORT"),
    }))
}
