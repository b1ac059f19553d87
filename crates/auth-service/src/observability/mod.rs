//! Observability for the auth service: tracing setup, correlation hashing
//! and metric labels.
//!
//! # Privacy
//!
//! Service functions use `#[instrument(skip_all)]` and allow-list fields
//! explicitly. Fields are one of:
//! - **SAFE**: logged in plaintext (identity ids, operation names, outcomes)
//! - **HASHED**: logged via [`hash_for_correlation`] (emails)
//! - **NEVER**: rotation secrets, their digests, access tokens

pub mod metrics;

use crate::config::LogLevel;
use crate::errors::AuthError;
use sha2::{Digest, Sha256};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global JSON tracing subscriber.
///
/// `RUST_LOG`, when set, overrides the filter derived from `LOG_LEVEL`.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.filter_directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars).
///
/// Not a secret-protection mechanism; truncation limits reversibility while
/// keeping entries for one identity linkable.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input
    Validation,
    /// Unknown identity
    NotFound,
    /// Lost compare-and-set or duplicate email
    Conflict,
    /// Secret mismatch or expired credential
    Authentication,
    /// Crypto or storage failure
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&AuthError> for ErrorCategory {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::Validation(_) => ErrorCategory::Validation,
            AuthError::NotFound(_) => ErrorCategory::NotFound,
            AuthError::Conflict(_) => ErrorCategory::Conflict,
            AuthError::Authentication | AuthError::ExpiredCredential => {
                ErrorCategory::Authentication
            }
            AuthError::Crypto(_) | AuthError::UpstreamStorage(_) => ErrorCategory::Internal,
        }
    }
}

/// Record `err` against `operation` in `auth_errors_total`.
pub fn record_auth_error(operation: &str, err: &AuthError) {
    self::metrics::record_error(
        operation,
        ErrorCategory::from(err).as_str(),
        err.status_code(),
    );
}
