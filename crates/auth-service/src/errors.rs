//! Auth service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! returned to clients for server-side failures are generic; the underlying
//! detail is logged server-side. No variant ever carries a plaintext secret
//! or a stored hash.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Auth service error type.
///
/// Maps to HTTP status codes:
/// - Validation: 400 Bad Request
/// - Authentication, ExpiredCredential: 401 Unauthorized
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - Crypto, UpstreamStorage: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    Authentication,

    #[error("Rotation credential expired")]
    ExpiredCredential,

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    UpstreamStorage(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 400,
            AuthError::Authentication | AuthError::ExpiredCredential => 401,
            AuthError::NotFound(_) => 404,
            AuthError::Conflict(_) => 409,
            AuthError::Crypto(_) | AuthError::UpstreamStorage(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::Validation(reason) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", reason.clone())
            }
            AuthError::NotFound(resource) => (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone()),
            AuthError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            AuthError::Authentication => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "The refresh token is invalid".to_string(),
            ),
            AuthError::ExpiredCredential => (
                StatusCode::UNAUTHORIZED,
                "CREDENTIAL_EXPIRED",
                "The refresh token has expired; request a new token pair".to_string(),
            ),
            AuthError::Crypto(err) => {
                tracing::error!(target: "auth.crypto", error = %err, "Cryptographic operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CRYPTO_ERROR",
                    "An internal cryptographic error occurred".to_string(),
                )
            }
            AuthError::UpstreamStorage(err) => {
                tracing::error!(target: "auth.storage", error = %err, "Storage operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "An internal storage error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"auth-service\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Convert sqlx errors to AuthError
impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::UpstreamStorage(err.to_string())
    }
}
