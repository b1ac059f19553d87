//! Chaos tests for concurrent rotation
//!
//! Many callers present the same rotation secret at once. `BarrierStore`
//! makes every caller read the identity before any of them reaches
//! compare-and-set, so exactly one wins and the rest see a conflict.

use auth_service::errors::AuthError;
use auth_service::repositories::{IdentityStore, InMemoryIdentityStore};
use auth_test_utils::{BarrierStore, TestAuthServer, TEST_EMAIL_ALICE};
use futures::future::join_all;
use reqwest::StatusCode;
use std::sync::Arc;

const CONTENDERS: usize = 8;

async fn barrier_server() -> Result<(TestAuthServer, Arc<BarrierStore>), anyhow::Error> {
    let barrier = Arc::new(BarrierStore::new(
        Arc::new(InMemoryIdentityStore::new()),
        CONTENDERS,
    ));
    let store: Arc<dyn IdentityStore> = barrier.clone();
    let server = TestAuthServer::builder().store(store).spawn().await?;
    Ok((server, barrier))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_has_single_winner() -> Result<(), anyhow::Error> {
    // Arrange
    let (server, barrier) = barrier_server().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let pair = server.create_token_pair(id).await?;
    barrier.arm();

    // Act
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let auth = server.auth().clone();
            let token = pair.refresh_token.clone();
            tokio::spawn(async move { auth.rotate_pair(id, &token).await })
        })
        .collect();
    let results = join_all(handles).await;
    barrier.disarm();

    // Assert
    let mut winners = Vec::new();
    let mut conflicts = 0;
    for joined in results {
        match joined? {
            Ok(pair) => winners.push(pair),
            Err(AuthError::Conflict(_)) => conflicts += 1,
            Err(other) => anyhow::bail!("Unexpected rotation error: {}", other),
        }
    }
    assert_eq!(winners.len(), 1, "Exactly one rotation should succeed");
    assert_eq!(conflicts, CONTENDERS - 1);

    // The winner's secret is the only live one.
    let winner = winners.remove(0);
    let replay = server.post_refresh(id, &pair.refresh_token).await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    let next = server.post_refresh(id, &winner.refresh_token).await?;
    assert_eq!(next.status(), StatusCode::CREATED);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_over_http_has_single_winner() -> Result<(), anyhow::Error> {
    // Arrange
    let (server, barrier) = barrier_server().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;
    let pair = server.create_token_pair(id).await?;
    barrier.arm();

    // Act
    let requests = (0..CONTENDERS).map(|_| server.post_refresh(id, &pair.refresh_token));
    let responses = join_all(requests).await;
    barrier.disarm();

    // Assert
    let mut created = 0;
    let mut conflicts = 0;
    for response in responses {
        match response?.status() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => anyhow::bail!("Unexpected status: {}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, CONTENDERS - 1);

    Ok(())
}

/// Concurrent issuance may return several pairs, but only the last secret
/// installed is accepted afterwards.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issuance_leaves_one_live_secret() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let id = server.register(TEST_EMAIL_ALICE).await?;

    // Act
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let auth = server.auth().clone();
            tokio::spawn(async move { auth.issue_pair(id).await })
        })
        .collect();
    let results = join_all(handles).await;

    // Assert
    let mut issued = Vec::new();
    for joined in results {
        match joined? {
            Ok(pair) => issued.push(pair),
            Err(AuthError::Conflict(_)) => {}
            Err(other) => anyhow::bail!("Unexpected issuance error: {}", other),
        }
    }
    assert!(!issued.is_empty(), "At least one issuance should succeed");

    let mut accepted = 0;
    for pair in &issued {
        let response = server.post_refresh(id, &pair.refresh_token).await?;
        if response.status() == StatusCode::CREATED {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1, "Exactly one issued secret should be live");

    Ok(())
}
