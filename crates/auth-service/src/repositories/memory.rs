//! In-process identity store for local development and tests.

use super::IdentityStore;
use crate::errors::AuthError;
use crate::models::{Identity, RotationState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Records {
    by_id: HashMap<Uuid, Identity>,
    by_email: HashMap<String, Uuid>,
}

/// [`IdentityStore`] held in memory. Each operation takes the lock once and
/// never awaits while holding it.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    records: RwLock<Records>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered identities.
    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn create_identity(&self, email: &str) -> Result<Uuid, AuthError> {
        let mut records = self.records.write().await;

        if records.by_email.contains_key(email) {
            return Err(AuthError::Conflict("Email is already registered".to_string()));
        }

        let mut id = Uuid::new_v4();
        while records.by_id.contains_key(&id) {
            id = Uuid::new_v4();
        }

        records.by_email.insert(email.to_string(), id);
        records.by_id.insert(
            id,
            Identity {
                id,
                email: email.to_string(),
                rotation: RotationState::NoRotation,
                created_at: Utc::now(),
            },
        );

        Ok(id)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Identity, AuthError> {
        self.records
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| AuthError::NotFound("Identity not found".to_string()))
    }

    async fn compare_and_set_rotation(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut records = self.records.write().await;

        let Some(identity) = records.by_id.get_mut(&id) else {
            return Ok(false);
        };

        if identity.rotation.current_hash() != expected_hash {
            return Ok(false);
        }

        identity.rotation = RotationState::Active {
            hash: new_hash.to_string(),
            expires_at: new_expires_at,
        };

        Ok(true)
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
