//! Integration tests for token pair issuance
//!
//! GET /api/createTokenPair/{uuid} issues an access token plus a rotation
//! secret, replacing whatever secret the identity held before.

use auth_service::config::DEFAULT_ACCESS_TOKEN_TTL_SECONDS;
use auth_service::repositories::IdentityStore;
use auth_test_utils::{
    RefreshTokenAssertions, TestAuthServer, TokenAssertions, TEST_EMAIL_ALICE, TEST_UNKNOWN_ID,
};
use reqwest::StatusCode;

#[tokio::test]
async fn test_create_token_pair_returns_valid_tokens() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;

    // Act
    let response = server.get_token_pair(&id.to_string()).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await?;
    let access_token = body["access_token"].as_str().unwrap_or_default().to_string();
    let refresh_token = body["refresh_token"].as_str().unwrap_or_default().to_string();

    access_token
        .assert_valid_jwt()
        .assert_for_subject(&id.to_string())
        .assert_has_email(TEST_EMAIL_ALICE)
        .assert_expires_in(DEFAULT_ACCESS_TOKEN_TTL_SECONDS);
    refresh_token.assert_valid_refresh_token();

    Ok(())
}

#[tokio::test]
async fn test_access_token_verifies_with_issuer() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;

    // Act
    let pair = server.create_token_pair(id).await?;

    // Assert
    let claims = server.auth().issuer().verify_access_token(&pair.access_token)?;
    assert_eq!(claims.sub, id.to_string());
    assert_eq!(claims.email, TEST_EMAIL_ALICE);

    Ok(())
}

#[tokio::test]
async fn test_create_token_pair_installs_rotation_secret() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;

    // Act
    server.create_token_pair(id).await?;

    // Assert
    let identity = server.store().get_by_id(id).await?;
    let hash = identity.rotation.current_hash().unwrap_or_default();
    assert!(hash.starts_with("$2"), "Stored value should be a bcrypt hash");

    Ok(())
}

#[tokio::test]
async fn test_create_token_pair_twice_invalidates_first_refresh_token() -> Result<(), anyhow::Error>
{
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let first = server.create_token_pair(id).await?;

    // Act
    let second = server.create_token_pair(id).await?;

    // Assert
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_ne!(first.access_token.jti(), second.access_token.jti());

    let stale = server.post_refresh(id, &first.refresh_token).await?;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    let current = server.post_refresh(id, &second.refresh_token).await?;
    assert_eq!(current.status(), StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn test_create_token_pair_unknown_identity_is_not_found() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = server.get_token_pair(&TEST_UNKNOWN_ID.to_string()).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_create_token_pair_malformed_uuid_is_bad_request() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = server.get_token_pair("not-a-uuid").await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
