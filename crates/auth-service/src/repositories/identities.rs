//! PostgreSQL identity store.

use super::IdentityStore;
use crate::errors::AuthError;
use crate::models::{Identity, RotationState};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Row of the `identities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    rotation_hash: Option<String>,
    rotation_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = AuthError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let rotation = match (row.rotation_hash, row.rotation_expires_at) {
            (None, None) => RotationState::NoRotation,
            (Some(hash), Some(expires_at)) => RotationState::Active { hash, expires_at },
            // Excluded by the table CHECK constraint
            _ => {
                return Err(AuthError::UpstreamStorage(format!(
                    "Inconsistent rotation state for identity {}",
                    row.id
                )))
            }
        };

        Ok(Identity {
            id: row.id,
            email: row.email,
            rotation,
            created_at: row.created_at,
        })
    }
}

/// [`IdentityStore`] backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl IdentityStore for PgIdentityStore {
    async fn create_identity(&self, email: &str) -> Result<Uuid, AuthError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO identities (email)
            VALUES ($1)
            RETURNING id
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let unique_violation = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if unique_violation {
                AuthError::Conflict("Email is already registered".to_string())
            } else {
                AuthError::UpstreamStorage(format!("Failed to create identity: {}", e))
            }
        })?;

        Ok(id)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Identity, AuthError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, rotation_hash, rotation_expires_at, created_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::UpstreamStorage(format!("Failed to fetch identity: {}", e)))?;

        row.ok_or_else(|| AuthError::NotFound("Identity not found".to_string()))?
            .try_into()
    }

    async fn compare_and_set_rotation(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET rotation_hash = $3,
                rotation_expires_at = $4,
                updated_at = NOW()
            WHERE id = $1
              AND rotation_hash IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(id)
        .bind(expected_hash)
        .bind(new_hash)
        .bind(new_expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AuthError::UpstreamStorage(format!("Failed to update rotation state: {}", e))
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::UpstreamStorage(format!("Ping failed: {}", e)))?;
        Ok(())
    }
}
