//! Token issuer: access token signing/verification and rotation secret
//! handling.
//!
//! All functions here are stateless with respect to storage. Time and
//! randomness come from injected sources.

pub mod random;

use crate::clock::Clock;
use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::AuthError;
use crate::models::Identity;
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use random::RandomSource;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Maximum accepted access token size in bytes (4KB).
///
/// Checked before any base64 decoding or signature verification. Typical
/// tokens issued here are under 400 bytes.
pub const MAX_JWT_SIZE_BYTES: usize = 4096;

/// Tolerance for `iat` values ahead of the local clock.
pub const JWT_CLOCK_SKEW_SECONDS: i64 = 300;

/// Raw rotation secret length before hex encoding.
pub const ROTATION_SECRET_BYTES: usize = 32;

/// Length of the hex-encoded rotation secret.
pub const ROTATION_SECRET_HEX_LEN: usize = ROTATION_SECRET_BYTES * 2;

const INVALID_ACCESS_TOKEN: &str = "The access token is invalid or expired";

/// Access token claims.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// `sub` and `email` identify a person and are redacted.
impl fmt::Debug for AccessClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessClaims")
            .field("sub", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("jti", &self.jti)
            .finish()
    }
}

/// Plaintext rotation secret (64 lowercase hex chars).
///
/// Only ever leaves the process transport-encoded in a response body. It is
/// never persisted; the store keeps its bcrypt digest.
pub struct RotationSecret(SecretString);

impl RotationSecret {
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for RotationSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RotationSecret([REDACTED])")
    }
}

/// Signs and verifies access tokens and manages rotation secrets.
pub struct TokenIssuer {
    signing_secret: SecretBox<Vec<u8>>,
    bcrypt_cost: u32,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("signing_secret", &"[REDACTED]")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(
        signing_secret: SecretBox<Vec<u8>>,
        bcrypt_cost: u32,
        random: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signing_secret,
            bcrypt_cost,
            random,
            clock,
        }
    }

    /// Sign an HS512 access token for `identity`, valid for `ttl`.
    #[instrument(skip_all)]
    pub fn issue_access_token(
        &self,
        identity: &Identity,
        ttl: chrono::Duration,
    ) -> Result<String, AuthError> {
        if identity.id.is_nil() {
            return Err(AuthError::Validation(
                "identity id must not be nil".to_string(),
            ));
        }
        if identity.email.trim().is_empty() {
            return Err(AuthError::Validation(
                "identity email must not be empty".to_string(),
            ));
        }

        let mut jti_bytes = [0u8; 16];
        self.random.fill(&mut jti_bytes)?;
        let jti = uuid::Builder::from_random_bytes(jti_bytes).into_uuid();

        let now = self.clock.now().timestamp();
        let exp = now
            .checked_add(ttl.num_seconds())
            .ok_or_else(|| AuthError::Crypto("Access token expiry is out of range".to_string()))?;
        let claims = AccessClaims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            iat: now,
            exp,
            jti: jti.to_string(),
        };

        let header = Header::new(Algorithm::HS512);
        let encoding_key = EncodingKey::from_secret(self.signing_secret.expose_secret());

        encode(&header, &claims, &encoding_key).map_err(|e| {
            tracing::error!(target: "auth.crypto", error = %e, "Access token signing failed");
            AuthError::Crypto(format!("JWT signing failed: {}", e))
        })
    }

    /// Verify signature, algorithm, expiry and `iat` of an access token.
    #[instrument(skip_all)]
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "auth.crypto",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(AuthError::Validation(INVALID_ACCESS_TOKEN.to_string()));
        }

        let decoding_key = DecodingKey::from_secret(self.signing_secret.expose_secret());

        // Expiry is checked below against the injected clock.
        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let token_data = decode::<AccessClaims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "auth.crypto", error = %e, "Token verification failed");
            AuthError::Validation(INVALID_ACCESS_TOKEN.to_string())
        })?;

        let now = self.clock.now().timestamp();
        let claims = token_data.claims;

        if claims.exp <= now {
            tracing::debug!(target: "auth.crypto", exp = claims.exp, now = now, "Token rejected: expired");
            return Err(AuthError::Validation(INVALID_ACCESS_TOKEN.to_string()));
        }

        let max_iat = now + JWT_CLOCK_SKEW_SECONDS;
        if claims.iat > max_iat {
            tracing::debug!(
                target: "auth.crypto",
                iat = claims.iat,
                now = now,
                max_allowed = max_iat,
                "Token rejected: iat too far in the future"
            );
            return Err(AuthError::Validation(INVALID_ACCESS_TOKEN.to_string()));
        }

        Ok(claims)
    }

    /// Draw a fresh 32-byte rotation secret from the random source.
    #[instrument(skip_all)]
    pub fn generate_rotation_secret(&self) -> Result<RotationSecret, AuthError> {
        let mut bytes = [0u8; ROTATION_SECRET_BYTES];
        self.random.fill(&mut bytes)?;
        Ok(RotationSecret(SecretString::from(hex::encode(bytes))))
    }

    /// bcrypt digest of `secret` with a fresh salt.
    #[instrument(skip_all)]
    pub fn hash_secret(&self, secret: &RotationSecret) -> Result<String, AuthError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(AuthError::Crypto(format!(
                "Invalid bcrypt cost: {} (must be {}-{})",
                self.bcrypt_cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }

        bcrypt::hash(secret.expose(), self.bcrypt_cost)
            .map_err(|e| AuthError::Crypto(format!("Secret hashing failed: {}", e)))
    }

    /// Compare `secret` against a stored digest.
    #[instrument(skip_all)]
    pub fn secret_matches(&self, secret: &RotationSecret, digest: &str) -> Result<bool, AuthError> {
        bcrypt::verify(secret.expose(), digest)
            .map_err(|e| AuthError::Crypto(format!("Secret verification failed: {}", e)))
    }

    /// Standard base64 of the hex secret, as sent to clients.
    pub fn encode_for_transport(&self, secret: &RotationSecret) -> String {
        general_purpose::STANDARD.encode(secret.expose().as_bytes())
    }

    /// Inverse of [`encode_for_transport`](Self::encode_for_transport).
    pub fn decode_from_transport(&self, wire: &str) -> Result<RotationSecret, AuthError> {
        let invalid = || AuthError::Validation("refresh_token is malformed".to_string());

        let bytes = general_purpose::STANDARD
            .decode(wire.trim())
            .map_err(|_| invalid())?;
        let hex_secret = String::from_utf8(bytes).map_err(|_| invalid())?;

        let well_formed = hex_secret.len() == ROTATION_SECRET_HEX_LEN
            && hex_secret
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(invalid());
        }

        Ok(RotationSecret(SecretString::from(hex_secret)))
    }
}
