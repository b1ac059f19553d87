//! Domain types and HTTP request/response bodies.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Rotation state of an identity.
///
/// An identity has either never been issued a rotation secret, or has
/// exactly one current hash together with its expiry.
#[derive(Clone, PartialEq, Eq)]
pub enum RotationState {
    NoRotation,
    Active {
        hash: String,
        expires_at: DateTime<Utc>,
    },
}

impl RotationState {
    /// The current hash, if any. This is the CAS expectation for the next
    /// conditional update.
    pub fn current_hash(&self) -> Option<&str> {
        match self {
            RotationState::NoRotation => None,
            RotationState::Active { hash, .. } => Some(hash.as_str()),
        }
    }
}

impl fmt::Debug for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationState::NoRotation => f.write_str("NoRotation"),
            RotationState::Active { expires_at, .. } => f
                .debug_struct("Active")
                .field("hash", &"[REDACTED]")
                .field("expires_at", expires_at)
                .finish(),
        }
    }
}

/// A registered identity.
#[derive(Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub rotation: RotationState,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &"[REDACTED]")
            .field("rotation", &self.rotation)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Register request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
}

/// Register response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub uuid: Uuid,
}

/// Access token plus transport-encoded rotation secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPairResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPairResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Refresh request. Both fields are optional at the JSON layer so missing
/// values surface as validation errors rather than extractor rejections.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<SecretString>,
    pub uuid: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            reason: None,
        }
    }

    pub fn fall(reason: &str) -> Self {
        Self {
            status: "fall".to_string(),
            reason: Some(reason.to_string()),
        }
    }
}
