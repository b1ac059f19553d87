//! Identity persistence.
//!
//! [`IdentityStore`] is the only serialization point for rotation state:
//! every change goes through [`IdentityStore::compare_and_set_rotation`].

pub mod identities;
pub mod memory;

pub use identities::PgIdentityStore;
pub use memory::InMemoryIdentityStore;

use crate::errors::AuthError;
use crate::models::Identity;
use crate::observability::metrics::record_store_operation;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Durable identity records.
///
/// Every mutation is a single atomic step in the backing store, so a caller
/// dropping the future mid-flight observes either the whole change or none
/// of it.
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Persist a new identity with no rotation state.
    ///
    /// Fails with `Conflict` when the email is already registered.
    async fn create_identity(&self, email: &str) -> Result<Uuid, AuthError>;

    /// Fails with `NotFound` when no identity has this id.
    async fn get_by_id(&self, id: Uuid) -> Result<Identity, AuthError>;

    /// Replace the rotation state of `id` only if its current hash equals
    /// `expected_hash` (`None` means the identity must have no rotation
    /// state). Returns `false` when the expectation is stale.
    async fn compare_and_set_rotation(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Liveness probe of the backing store.
    async fn ping(&self) -> Result<(), AuthError>;
}

/// Run a store call under `timeout`.
///
/// On expiry the future is dropped and `UpstreamStorage` is returned.
pub async fn with_deadline<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => {
            record_store_operation(operation, "success");
            Ok(value)
        }
        Ok(Err(e)) => {
            record_store_operation(operation, "error");
            Err(e)
        }
        Err(_) => {
            tracing::warn!(
                target: "auth.storage",
                operation = operation,
                timeout_ms = timeout.as_millis() as u64,
                "Store operation exceeded deadline"
            );
            record_store_operation(operation, "timeout");
            Err(AuthError::UpstreamStorage(format!(
                "{} exceeded deadline of {}ms",
                operation,
                timeout.as_millis()
            )))
        }
    }
}
