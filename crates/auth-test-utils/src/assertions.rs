//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for access and refresh tokens.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use serde::Deserialize;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

/// Access token claims
#[derive(Debug, Deserialize)]
struct JwtClaims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

fn decode_claims(token: &str) -> JwtClaims {
    let parts: Vec<_> = token.split('.').collect();
    assert_eq!(parts.len(), 3, "JWT must have 3 parts");

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .expect("Failed to decode JWT payload");
    serde_json::from_slice(&payload).expect("Failed to parse JWT claims")
}

/// Custom assertions for access tokens
///
/// # Example
/// ```rust,ignore
/// pair.access_token
///     .assert_valid_jwt()
///     .assert_for_subject(&id.to_string())
///     .assert_has_email("alice@example.com")
///     .assert_expires_in(900);
/// ```
pub trait TokenAssertions {
    /// Assert that the token is an HS512 JWT
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert that the token is for the specified subject
    fn assert_for_subject(&self, subject: &str) -> &Self;

    /// Assert that the token carries the specified email claim
    fn assert_has_email(&self, email: &str) -> &Self;

    /// Assert that `exp - iat` equals `seconds`
    fn assert_expires_in(&self, seconds: i64) -> &Self;

    /// The `jti` claim, for uniqueness checks
    fn jti(&self) -> String;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts: Vec<_> = self.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts.len()
        );

        let header_result = URL_SAFE_NO_PAD.decode(parts[0]);
        assert!(
            header_result.is_ok(),
            "Failed to base64 decode JWT header: {:?}",
            header_result.err()
        );

        let header: Result<JwtHeader, _> = serde_json::from_slice(&header_result.unwrap());
        assert!(
            header.is_ok(),
            "Failed to parse JWT header JSON: {:?}",
            header.err()
        );

        let header = header.unwrap();
        assert_eq!(header.alg, "HS512", "Expected HS512 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        assert!(!parts[2].is_empty(), "JWT signature must not be empty");

        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = decode_claims(self);
        assert_eq!(
            claims.sub, subject,
            "Expected subject '{}', got '{}'",
            subject, claims.sub
        );
        self
    }

    fn assert_has_email(&self, email: &str) -> &Self {
        let claims = decode_claims(self);
        assert_eq!(
            claims.email, email,
            "Expected email '{}', got '{}'",
            email, claims.email
        );
        self
    }

    fn assert_expires_in(&self, seconds: i64) -> &Self {
        let claims = decode_claims(self);
        let lifetime = claims.exp - claims.iat;
        assert_eq!(
            lifetime, seconds,
            "Expected token lifetime of {}s, got {}s",
            seconds, lifetime
        );
        self
    }

    fn jti(&self) -> String {
        decode_claims(self).jti
    }
}

/// Custom assertions for transport-encoded refresh tokens
pub trait RefreshTokenAssertions {
    /// Assert standard base64 wrapping 64 lowercase hex characters
    fn assert_valid_refresh_token(&self) -> &Self;
}

impl RefreshTokenAssertions for String {
    fn assert_valid_refresh_token(&self) -> &Self {
        let decoded = STANDARD
            .decode(self)
            .expect("Refresh token must be standard base64");
        let text = String::from_utf8(decoded).expect("Refresh token must wrap UTF-8 text");

        assert_eq!(text.len(), 64, "Refresh secret must be 64 hex chars");
        assert!(
            text.chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)),
            "Refresh secret must be lowercase hex, got '{}'",
            text
        );
        self
    }
}
