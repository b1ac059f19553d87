//! HTTP routes for the auth service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::http_metrics::http_metrics_middleware;
use crate::repositories::IdentityStore;
use crate::services::AuthService;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,

    /// Same store the orchestrator uses; pinged by the health check.
    pub store: Arc<dyn IdentityStore>,

    pub health_ping_timeout: Duration,
}

/// Build the application routes.
///
/// - `GET /api/healthchecker`
/// - `POST /api/register`
/// - `GET /api/createTokenPair/{uuid}`
/// - `POST /api/refreshToken`
/// - `GET /metrics`
///
/// Every route is wrapped in request tracing, a 30 second timeout and HTTP
/// metrics.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/api/healthchecker", get(handlers::health_check))
        .route("/api/register", post(handlers::handle_register))
        .route(
            "/api/createTokenPair/:uuid",
            get(handlers::handle_create_token_pair),
        )
        .route("/api/refreshToken", post(handlers::handle_refresh_token))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (outermost last): metrics see the final status, including
    // timeouts.
    api_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
