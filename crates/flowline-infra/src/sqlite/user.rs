//! SQLite user store.
//!
//! Users are JSON blobs with indexed email and platform-identity columns.
//! The partial unique index on `(platform, platform_external_id)` backs
//! create-on-first-message idempotency.

use flowline_core::repository::user::UserStore;
use flowline_types::error::RepositoryError;
use flowline_types::user::{PlatformIdentity, WorkflowUser};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `UserStore`.
pub struct SqliteUserStore {
    pool: DatabasePool,
}

impl SqliteUserStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowUser, RepositoryError> {
        let payload: String = row
            .try_get("payload")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        serde_json::from_str(&payload)
            .map_err(|e| RepositoryError::Query(format!("invalid user JSON: {e}")))
    }
}

impl UserStore for SqliteUserStore {
    async fn get(&self, id: Uuid) -> Result<Option<WorkflowUser>, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn find_by_platform_identity(
        &self,
        identity: &PlatformIdentity,
    ) -> Result<Option<WorkflowUser>, RepositoryError> {
        let row = sqlx::query(
            "SELECT payload FROM users WHERE platform = ? AND platform_external_id = ?",
        )
        .bind(identity.platform.to_string())
        .bind(&identity.external_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<WorkflowUser>, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn upsert(&self, user: &WorkflowUser) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(user)
            .map_err(|e| RepositoryError::Query(format!("serialize user: {e}")))?;
        let (platform, external_id) = match &user.platform_identity {
            Some(identity) => (
                Some(identity.platform.to_string()),
                Some(identity.external_id.clone()),
            ),
            None => (None, None),
        };

        sqlx::query(
            r#"INSERT INTO users
               (id, email, display_name, platform, platform_external_id, payload, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 email = excluded.email,
                 display_name = excluded.display_name,
                 platform = excluded.platform,
                 platform_external_id = excluded.platform_external_id,
                 payload = excluded.payload,
                 updated_at = excluded.updated_at"#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&platform)
        .bind(&external_id)
        .bind(&payload)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
