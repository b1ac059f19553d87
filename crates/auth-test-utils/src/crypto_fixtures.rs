//! Deterministic cryptographic fixtures for testing

use auth_service::clock::Clock;
use auth_service::crypto::random::SequenceRandom;
use auth_service::crypto::TokenIssuer;
use base64::engine::general_purpose;
use base64::Engine;
use secrecy::SecretBox;
use std::sync::Arc;

use crate::test_ids::TEST_BCRYPT_COST;

/// Deterministic 64-byte HS512 signing secret.
pub fn test_signing_secret_bytes() -> Vec<u8> {
    (0u8..64).map(|i| i.wrapping_mul(7).wrapping_add(13)).collect()
}

pub fn test_signing_secret() -> SecretBox<Vec<u8>> {
    SecretBox::new(Box::new(test_signing_secret_bytes()))
}

/// The signing secret as it would appear in `AUTH_JWT_SECRET`.
pub fn test_signing_secret_base64() -> String {
    general_purpose::STANDARD.encode(test_signing_secret_bytes())
}

/// Token issuer with the test signing secret, lowest bcrypt cost and a
/// deterministic random source.
pub fn test_issuer(clock: Arc<dyn Clock>) -> TokenIssuer {
    TokenIssuer::new(
        test_signing_secret(),
        TEST_BCRYPT_COST,
        Arc::new(SequenceRandom::new()),
        clock,
    )
}

/// A well-formed refresh token (base64 of 64 hex chars) that no identity
/// has ever been issued.
pub fn forged_refresh_token(seed: u8) -> String {
    let hex_secret: String = (0..32)
        .map(|i: u8| format!("{:02x}", seed.wrapping_add(i.wrapping_mul(17))))
        .collect();
    general_purpose::STANDARD.encode(hex_secret)
}
