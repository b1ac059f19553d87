//! Fault injection tests for lost compare-and-set races
//!
//! `InterferingStore` slips a competing write in front of the caller's
//! compare-and-set, so the caller's expected hash is stale.

use auth_service::errors::AuthError;
use auth_service::repositories::{IdentityStore, InMemoryIdentityStore};
use auth_test_utils::{InterferingStore, TestAuthServer, TEST_EMAIL_ALICE};
use reqwest::StatusCode;
use std::sync::Arc;

async fn interfering_server(
    times: usize,
) -> Result<(TestAuthServer, Arc<InterferingStore>), anyhow::Error> {
    let interfering = Arc::new(InterferingStore::new(
        Arc::new(InMemoryIdentityStore::new()),
        times,
    ));
    let store: Arc<dyn IdentityStore> = interfering.clone();
    let server = TestAuthServer::builder().store(store).spawn().await?;
    Ok((server, interfering))
}

#[tokio::test]
async fn test_issue_pair_retries_after_one_lost_race() -> Result<(), anyhow::Error> {
    // Arrange
    let (server, interfering) = interfering_server(1).await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;

    // Act
    let pair = server.create_token_pair(id).await?;

    // Assert
    assert_eq!(interfering.interferences(), 1);
    let rotated = server.post_refresh(id, &pair.refresh_token).await?;
    assert_eq!(rotated.status(), StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn test_issue_pair_conflicts_after_repeated_lost_races() -> Result<(), anyhow::Error> {
    // Arrange
    let (server, interfering) = interfering_server(2).await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;

    // Act
    let response = server.get_token_pair(&id.to_string()).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(interfering.interferences(), 2);

    // Interference exhausted; the next request goes through.
    server.create_token_pair(id).await?;

    Ok(())
}

#[tokio::test]
async fn test_rotate_pair_lost_race_is_conflict_without_retry() -> Result<(), anyhow::Error> {
    // Arrange
    let (server, interfering) = interfering_server(0).await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let pair = server.create_token_pair(id).await?;
    interfering.interfere_next(1);

    // Act
    let result = server.auth().rotate_pair(id, &pair.refresh_token).await;

    // Assert
    assert!(
        matches!(result, Err(AuthError::Conflict(_))),
        "Expected a conflict, got {:?}",
        result
    );
    assert_eq!(interfering.interferences(), 1);

    // The competing writer consumed the secret.
    let replay = server.post_refresh(id, &pair.refresh_token).await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_rotate_pair_lost_race_over_http_is_conflict() -> Result<(), anyhow::Error> {
    // Arrange
    let (server, interfering) = interfering_server(0).await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let pair = server.create_token_pair(id).await?;
    interfering.interfere_next(1);

    // Act
    let response = server.post_refresh(id, &pair.refresh_token).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "CONFLICT");

    Ok(())
}
