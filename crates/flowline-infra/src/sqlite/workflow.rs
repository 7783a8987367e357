//! SQLite workflow store.
//!
//! Workflows are stored as JSON blobs with indexed owner/public columns;
//! share grants are mirrored into a `workflow_shares` side table so
//! `list_shared_with` is a join instead of a blob scan. The blob is the
//! source of truth -- the side table is rebuilt on every save.

use flowline_core::repository::workflow::WorkflowStore;
use flowline_types::error::RepositoryError;
use flowline_types::workflow::Workflow;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `WorkflowStore`.
pub struct SqliteWorkflowStore {
    pool: DatabasePool,
}

impl SqliteWorkflowStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<Workflow, RepositoryError> {
        let definition: String = row
            .try_get("definition")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        serde_json::from_str(&definition)
            .map_err(|e| RepositoryError::Query(format!("invalid workflow JSON: {e}")))
    }
}

impl WorkflowStore for SqliteWorkflowStore {
    async fn get(&self, id: Uuid) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn save(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let definition = serde_json::to_string(workflow)
            .map_err(|e| RepositoryError::Query(format!("serialize workflow: {e}")))?;

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO workflows (id, name, owner_id, is_public, definition, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 owner_id = excluded.owner_id,
                 is_public = excluded.is_public,
                 definition = excluded.definition,
                 updated_at = excluded.updated_at"#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(workflow.owner_id.to_string())
        .bind(workflow.is_public as i32)
        .bind(&definition)
        .bind(workflow.created_at.to_rfc3339())
        .bind(workflow.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Rebuild the share mirror.
        sqlx::query("DELETE FROM workflow_shares WHERE workflow_id = ?")
            .bind(workflow.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        for grant in &workflow.shared_with {
            sqlx::query(
                "INSERT INTO workflow_shares (workflow_id, user_id, can_edit) VALUES (?, ?, ?)",
            )
            .bind(workflow.id.to_string())
            .bind(grant.user_id.to_string())
            .bind(grant.can_edit as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query("SELECT definition FROM workflows WHERE owner_id = ? ORDER BY id")
            .bind(owner_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn list_shared_with(&self, user_id: Uuid) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT w.definition AS definition
               FROM workflows w
               JOIN workflow_shares s ON s.workflow_id = w.id
               WHERE s.user_id = ? AND w.owner_id != ?
               ORDER BY w.id"#,
        )
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn list_all(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query("SELECT definition FROM workflows ORDER BY id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(Self::decode).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
