//! Integration tests for refresh rotation
//!
//! POST /api/refreshToken exchanges the current rotation secret for a new
//! pair. Each secret is accepted at most once; a consumed or replaced secret
//! is rejected with 401.

use auth_test_utils::{
    forged_refresh_token, RefreshTokenAssertions, TestAuthServer, TokenAssertions,
    TEST_EMAIL_ALICE, TEST_EMAIL_BOB, TEST_UNKNOWN_ID,
};
use chrono::Duration;
use reqwest::StatusCode;
use uuid::Uuid;

async fn rotate_ok(
    server: &TestAuthServer,
    id: Uuid,
    refresh_token: &str,
) -> Result<serde_json::Value, anyhow::Error> {
    let response = server.post_refresh(id, refresh_token).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(response.json().await?)
}

/// Register, issue S1, rotate S1 to S2, replay S1, rotate S2 to S3.
#[tokio::test]
async fn test_rotation_walkthrough() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let s1 = server.create_token_pair(id).await?.refresh_token;

    // Act: S1 -> S2
    let body = rotate_ok(&server, id, &s1).await?;
    let s2 = body["refresh_token"].as_str().unwrap_or_default().to_string();

    // Assert
    s2.assert_valid_refresh_token();
    assert_ne!(s1, s2);
    body["access_token"]
        .as_str()
        .unwrap_or_default()
        .to_string()
        .assert_valid_jwt()
        .assert_for_subject(&id.to_string())
        .assert_has_email(TEST_EMAIL_ALICE);

    // Act: replay S1
    let replay = server.post_refresh(id, &s1).await?;

    // Assert
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert!(replay.headers().contains_key("www-authenticate"));
    let error: serde_json::Value = replay.json().await?;
    assert_eq!(error["error"]["code"], "INVALID_CREDENTIALS");

    // Act: S2 -> S3, the replay did not disturb S2
    let body = rotate_ok(&server, id, &s2).await?;
    let s3 = body["refresh_token"].as_str().unwrap_or_default().to_string();

    // Assert
    assert_ne!(s2, s3);
    let replay = server.post_refresh(id, &s2).await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_rotation_before_any_pair_is_unauthorized() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;

    // Act
    let response = server.post_refresh(id, &forged_refresh_token(1)).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_rotation_with_forged_secret_is_unauthorized() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let pair = server.create_token_pair(id).await?;

    // Act
    let forged = server.post_refresh(id, &forged_refresh_token(9)).await?;

    // Assert
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    rotate_ok(&server, id, &pair.refresh_token).await?;

    Ok(())
}

#[tokio::test]
async fn test_rotation_with_other_identitys_secret_is_unauthorized() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let alice = server.register(TEST_EMAIL_ALICE).await?;
    let bob = server.register(TEST_EMAIL_BOB).await?;
    let alice_pair = server.create_token_pair(alice).await?;
    server.create_token_pair(bob).await?;

    // Act
    let response = server.post_refresh(bob, &alice_pair.refresh_token).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    rotate_ok(&server, alice, &alice_pair.refresh_token).await?;

    Ok(())
}

#[tokio::test]
async fn test_rotation_with_malformed_secret_is_bad_request() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    server.create_token_pair(id).await?;

    // Act
    let response = server.post_refresh(id, "%%%not-base64%%%").await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_rotation_unknown_identity_is_not_found() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = server
        .post_refresh(TEST_UNKNOWN_ID, &forged_refresh_token(2))
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_rotation_missing_uuid_is_bad_request() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = server
        .client()
        .post(format!("{}/api/refreshToken", server.url()))
        .json(&serde_json::json!({ "refresh_token": forged_refresh_token(3) }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    Ok(())
}

#[tokio::test]
async fn test_rotation_after_expiry_is_unauthorized() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::builder()
        .refresh_token_ttl(Duration::seconds(60))
        .spawn()
        .await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let pair = server.create_token_pair(id).await?;

    // Act
    server.clock().advance(Duration::seconds(61));
    let response = server.post_refresh(id, &pair.refresh_token).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "CREDENTIAL_EXPIRED");

    // A fresh pair recovers the identity.
    let recovered = server.create_token_pair(id).await?;
    rotate_ok(&server, id, &recovered.refresh_token).await?;

    Ok(())
}

#[tokio::test]
async fn test_rotation_at_exact_expiry_is_accepted() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::builder()
        .refresh_token_ttl(Duration::seconds(60))
        .spawn()
        .await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let pair = server.create_token_pair(id).await?;

    // Act
    server.clock().advance(Duration::seconds(60));
    let response = server.post_refresh(id, &pair.refresh_token).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn test_rotation_restarts_refresh_lifetime() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::builder()
        .refresh_token_ttl(Duration::seconds(60))
        .spawn()
        .await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let s1 = server.create_token_pair(id).await?.refresh_token;

    // Act: rotate late in S1's life, then use S2 past S1's original expiry
    server.clock().advance(Duration::seconds(50));
    let body = rotate_ok(&server, id, &s1).await?;
    let s2 = body["refresh_token"].as_str().unwrap_or_default().to_string();
    server.clock().advance(Duration::seconds(50));

    // Assert
    rotate_ok(&server, id, &s2).await?;

    Ok(())
}
