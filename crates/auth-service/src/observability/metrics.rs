//! Metrics definitions for the auth service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `operation`: register, issue_pair, rotate_pair, plus store operation names
//! - `status`: success, error (plus `timeout` for store operations)
//! - `error_category`: see [`super::ErrorCategory`]
//! - `path`: fixed route set, UUID segments collapsed to `{uuid}`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// # Errors
///
/// Returns error if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Pair issuance includes a bcrypt hash (~50-250ms at default cost)
        .set_buckets_for_metric(
            Matcher::Prefix("auth_token_pair".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set token pair buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("auth_http".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Identity Metrics
// ============================================================================

/// Metric: `auth_registrations_total`
/// Labels: `status`
pub fn record_registration(status: &str) {
    counter!("auth_registrations_total", "status" => status.to_string()).increment(1);
}

// ============================================================================
// Token Pair Metrics
// ============================================================================

/// Record token pair issuance or rotation duration and outcome
///
/// Metric: `auth_token_pair_duration_seconds`, `auth_token_pairs_total`
/// Labels: `operation` (issue_pair, rotate_pair), `status`
pub fn record_token_pair(operation: &str, status: &str, duration: Duration) {
    histogram!("auth_token_pair_duration_seconds", "operation" => operation.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("auth_token_pairs_total", "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a lost compare-and-set.
///
/// Metric: `auth_rotation_conflicts_total`
/// Labels: `operation`
pub fn record_rotation_conflict(operation: &str) {
    counter!("auth_rotation_conflicts_total", "operation" => operation.to_string()).increment(1);
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Metric: `auth_store_operations_total`
/// Labels: `operation`, `status` (success, error, timeout)
pub fn record_store_operation(operation: &str, status: &str) {
    counter!("auth_store_operations_total", "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category
///
/// Metric: `auth_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!("auth_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `auth_http_requests_total`, `auth_http_request_duration_seconds`
/// Labels: `method`, `path`, `status_code`
///
/// Captures framework-level rejections (415, 405, unmatched routes) as well
/// as handler responses.
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let normalized_path = normalize_path(path);

    histogram!("auth_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => normalized_path.clone(),
        "status_code" => status_code.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("auth_http_requests_total",
        "method" => method.to_string(),
        "path" => normalized_path,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Collapse a request path onto the fixed route set.
fn normalize_path(path: &str) -> String {
    match path {
        "/api/healthchecker" | "/api/register" | "/api/refreshToken" | "/metrics" => {
            path.to_string()
        }
        _ => normalize_dynamic_path(path),
    }
}

/// `/api/createTokenPair/<uuid>` → `/api/createTokenPair/{uuid}`; anything
/// else → `/other`.
fn normalize_dynamic_path(path: &str) -> String {
    if let Some(segment) = path.strip_prefix("/api/createTokenPair/") {
        if is_uuid(segment) {
            return "/api/createTokenPair/{uuid}".to_string();
        }
    }

    "/other".to_string()
}

/// Lightweight 8-4-4-4-12 hex check; does not validate UUID variants.
fn is_uuid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }

    s.bytes().enumerate().all(|(i, byte)| match i {
        8 | 13 | 18 | 23 => byte == b'-',
        _ => byte.is_ascii_hexdigit(),
    })
}
