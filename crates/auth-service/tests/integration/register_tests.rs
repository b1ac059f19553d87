//! Integration tests for identity registration
//!
//! POST /api/register creates an identity with no rotation secret and
//! returns its id.

use auth_service::models::RotationState;
use auth_service::repositories::IdentityStore;
use auth_test_utils::{TestAuthServer, TEST_EMAIL_ALICE, TEST_EMAIL_BOB};
use reqwest::StatusCode;

#[tokio::test]
async fn test_register_returns_created_with_uuid() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = server
        .client()
        .post(format!("{}/api/register", server.url()))
        .json(&serde_json::json!({ "email": TEST_EMAIL_ALICE }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await?;
    let raw_id = body["uuid"].as_str().unwrap_or_default();
    assert!(
        uuid::Uuid::parse_str(raw_id).is_ok(),
        "uuid should be a valid identifier, got '{}'",
        raw_id
    );

    Ok(())
}

#[tokio::test]
async fn test_registered_identity_has_no_rotation_secret() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let id = server.register(TEST_EMAIL_ALICE).await?;

    // Assert
    let identity = server.store().get_by_id(id).await?;
    assert_eq!(identity.email, TEST_EMAIL_ALICE);
    assert!(matches!(identity.rotation, RotationState::NoRotation));

    Ok(())
}

#[tokio::test]
async fn test_register_assigns_distinct_ids() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let alice = server.register(TEST_EMAIL_ALICE).await?;
    let bob = server.register(TEST_EMAIL_BOB).await?;

    // Assert
    assert_ne!(alice, bob);

    Ok(())
}

#[tokio::test]
async fn test_register_duplicate_email_is_conflict() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    server.register(TEST_EMAIL_ALICE).await?;

    // Act
    let response = server
        .client()
        .post(format!("{}/api/register", server.url()))
        .json(&serde_json::json!({ "email": TEST_EMAIL_ALICE }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "CONFLICT");

    Ok(())
}

#[tokio::test]
async fn test_register_blank_email_is_bad_request() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = server
        .client()
        .post(format!("{}/api/register", server.url()))
        .json(&serde_json::json!({ "email": "   " }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    Ok(())
}

#[tokio::test]
async fn test_register_missing_email_is_bad_request() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = server
        .client()
        .post(format!("{}/api/register", server.url()))
        .json(&serde_json::json!({ "name": "alice" }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_register_overlong_email_is_bad_request() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let email = format!("{}@example.com", "a".repeat(256));

    // Act
    let response = server
        .client()
        .post(format!("{}/api/register", server.url()))
        .json(&serde_json::json!({ "email": email }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    Ok(())
}
