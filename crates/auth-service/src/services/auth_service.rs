//! Registration, token pair issuance and refresh rotation.

use crate::clock::Clock;
use crate::config::Config;
use crate::crypto::{RotationSecret, TokenIssuer};
use crate::errors::AuthError;
use crate::models::{Identity, RotationState, TokenPairResponse};
use crate::observability::metrics::{
    record_registration, record_rotation_conflict, record_token_pair,
};
use crate::observability::{hash_for_correlation, record_auth_error};
use crate::repositories::{with_deadline, IdentityStore};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;
use uuid::Uuid;

/// Extra compare-and-set attempts `issue_pair` makes after losing a race.
const ISSUE_PAIR_RETRIES: usize = 1;

/// Longest accepted email, in characters. Matches the `identities.email`
/// column width.
pub const MAX_EMAIL_LENGTH: usize = 255;

/// Lifetimes and deadlines used by [`AuthService`].
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub store_timeout: Duration,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            access_token_ttl: chrono::Duration::seconds(config.access_token_ttl_seconds),
            refresh_token_ttl: chrono::Duration::seconds(config.refresh_token_ttl_seconds),
            store_timeout: Duration::from_millis(config.store_timeout_ms),
        }
    }
}

/// Access token plus transport-encoded rotation secret.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        TokenPairResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

/// Owns the issuance and rotation protocol. Holds no per-identity state;
/// the store's compare-and-set is the only serialization point.
pub struct AuthService {
    store: Arc<dyn IdentityStore>,
    issuer: Arc<TokenIssuer>,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        issuer: Arc<TokenIssuer>,
        clock: Arc<dyn Clock>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            issuer,
            clock,
            settings,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Register a new identity and return its id.
    #[instrument(skip_all, name = "auth.register", fields(email_hash = %hash_for_correlation(email)))]
    pub async fn register(&self, email: &str) -> Result<Uuid, AuthError> {
        let result = self.register_inner(email).await;

        match &result {
            Ok(id) => {
                record_registration("success");
                tracing::info!(target: "auth.service", identity_id = %id, "Identity registered");
            }
            Err(e) => {
                record_registration("error");
                record_auth_error("register", e);
                tracing::info!(target: "auth.service", error = %e, "Registration failed");
            }
        }

        result
    }

    async fn register_inner(&self, email: &str) -> Result<Uuid, AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::Validation("email cannot be empty".to_string()));
        }
        if email.chars().count() > MAX_EMAIL_LENGTH {
            return Err(AuthError::Validation(format!(
                "email must be at most {} characters",
                MAX_EMAIL_LENGTH
            )));
        }

        with_deadline(
            self.settings.store_timeout,
            "create_identity",
            self.store.create_identity(email),
        )
        .await
    }

    /// Issue a fresh token pair for `id`, replacing any existing rotation
    /// secret.
    #[instrument(skip_all, name = "auth.issue_pair", fields(identity_id = %id))]
    pub async fn issue_pair(&self, id: Uuid) -> Result<TokenPair, AuthError> {
        let start = Instant::now();
        let result = self.issue_pair_inner(id).await;
        self.finish("issue_pair", start, &result);
        result
    }

    async fn issue_pair_inner(&self, id: Uuid) -> Result<TokenPair, AuthError> {
        let mut identity = self.fetch(id).await?;

        let access_token = self
            .issuer
            .issue_access_token(&identity, self.settings.access_token_ttl)?;
        let secret = self.issuer.generate_rotation_secret()?;
        let (secret, new_hash) = self.hash_off_runtime(secret).await?;

        let mut attempt = 0;
        loop {
            let expires_at = self.rotation_expiry()?;
            let swapped = self
                .swap_rotation(id, identity.rotation.current_hash(), &new_hash, expires_at)
                .await?;

            if swapped {
                return Ok(TokenPair {
                    access_token,
                    refresh_token: self.issuer.encode_for_transport(&secret),
                });
            }

            record_rotation_conflict("issue_pair");
            if attempt >= ISSUE_PAIR_RETRIES {
                return Err(AuthError::Conflict(
                    "Rotation state changed concurrently; retry the request".to_string(),
                ));
            }
            attempt += 1;

            tracing::debug!(target: "auth.service", attempt = attempt, "Lost rotation race, re-reading identity");
            identity = self.fetch(id).await?;
        }
    }

    /// Exchange the presented rotation secret for a new pair. The presented
    /// secret stops being valid in the same step that installs the new one.
    #[instrument(skip_all, name = "auth.rotate_pair", fields(identity_id = %id))]
    pub async fn rotate_pair(&self, id: Uuid, presented: &str) -> Result<TokenPair, AuthError> {
        let start = Instant::now();
        let result = self.rotate_pair_inner(id, presented).await;
        self.finish("rotate_pair", start, &result);
        result
    }

    async fn rotate_pair_inner(&self, id: Uuid, presented: &str) -> Result<TokenPair, AuthError> {
        let identity = self.fetch(id).await?;

        let (current_hash, expires_at) = match &identity.rotation {
            RotationState::NoRotation => return Err(AuthError::Authentication),
            RotationState::Active { hash, expires_at } => (hash.clone(), *expires_at),
        };

        if self.clock.now() > expires_at {
            return Err(AuthError::ExpiredCredential);
        }

        let presented = self.issuer.decode_from_transport(presented)?;
        if !self
            .verify_off_runtime(presented, current_hash.clone())
            .await?
        {
            return Err(AuthError::Authentication);
        }

        let secret = self.issuer.generate_rotation_secret()?;
        let (secret, new_hash) = self.hash_off_runtime(secret).await?;
        let new_expires_at = self.rotation_expiry()?;

        let swapped = self
            .swap_rotation(id, Some(&current_hash), &new_hash, new_expires_at)
            .await?;
        if !swapped {
            record_rotation_conflict("rotate_pair");
            return Err(AuthError::Conflict(
                "Refresh token was used concurrently".to_string(),
            ));
        }

        let access_token = self
            .issuer
            .issue_access_token(&identity, self.settings.access_token_ttl)?;

        Ok(TokenPair {
            access_token,
            refresh_token: self.issuer.encode_for_transport(&secret),
        })
    }

    /// `now + refresh_token_ttl`, failing instead of overflowing.
    fn rotation_expiry(&self) -> Result<DateTime<Utc>, AuthError> {
        self.clock
            .now()
            .checked_add_signed(self.settings.refresh_token_ttl)
            .ok_or_else(|| {
                AuthError::Crypto("Rotation secret expiry is out of range".to_string())
            })
    }

        async fn fetch(&self, id: Uuid) -> Result<Identity, AuthError> {
        with_deadline(
            self.settings.store_timeout,
            "get_by_id",
            self.store.get_by_id(id),
        )
        .await
    }

    async fn swap_rotation(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        with_deadline(
            self.settings.store_timeout,
            "compare_and_set_rotation",
            self.store
                .compare_and_set_rotation(id, expected_hash, new_hash, new_expires_at),
        )
        .await
    }

    async fn hash_off_runtime(
        &self,
        secret: RotationSecret,
    ) -> Result<(RotationSecret, String), AuthError> {
        let issuer = Arc::clone(&self.issuer);
        tokio::task::spawn_blocking(move || {
            let hash = issuer.hash_secret(&secret)?;
            Ok((secret, hash))
        })
        .await
        .map_err(|e| AuthError::Crypto(format!("Hashing task failed: {}", e)))?
    }

    async fn verify_off_runtime(
        &self,
        secret: RotationSecret,
        digest: String,
    ) -> Result<bool, AuthError> {
        let issuer = Arc::clone(&self.issuer);
        tokio::task::spawn_blocking(move || issuer.secret_matches(&secret, &digest))
        .await
        .map_err(|e| AuthError::Crypto(format!("Verification task failed: {}", e)))?
    }

    fn finish(&self, operation: &str, start: Instant, result: &Result<TokenPair, AuthError>) {
        let duration = start.elapsed();
        match result {
            Ok(_) => {
                record_token_pair(operation, "success", duration);
                tracing::info!(target: "auth.service", operation = operation, "Token pair issued");
            }
            Err(e) => {
                record_token_pair(operation, "error", duration);
                record_auth_error(operation, e);
                tracing::info!(target: "auth.service", operation = operation, error = %e, "Token pair request failed");
            }
        }
    }
}
