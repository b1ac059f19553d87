//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/healthchecker
///
/// Always answers 200; a failing store is reported in the body as
/// `{"status":"fall","reason":...}` with reason `timeout` or `unavailable`.
#[instrument(skip_all, name = "auth.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let response = match tokio::time::timeout(state.health_ping_timeout, state.store.ping()).await
    {
        Ok(Ok(())) => HealthResponse::ok(),
        Ok(Err(e)) => {
            tracing::warn!(target: "auth.health", error = %e, "Store ping failed");
            HealthResponse::fall("unavailable")
        }
        Err(_) => {
            tracing::warn!(
                target: "auth.health",
                timeout_ms = state.health_ping_timeout.as_millis() as u64,
                "Store ping timed out"
            );
            HealthResponse::fall("timeout")
        }
    };

    Json(response)
}
