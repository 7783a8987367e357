//! SQLite execution store.
//!
//! Records are append-only JSON blobs; there is no UPDATE path. The
//! `(workflow_id, started_at DESC)` index serves the history query.

use flowline_core::repository::execution::ExecutionStore;
use flowline_types::error::RepositoryError;
use flowline_types::execution::ExecutionRecord;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ExecutionStore`.
pub struct SqliteExecutionStore {
    pool: DatabasePool,
}

impl SqliteExecutionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<ExecutionRecord, RepositoryError> {
        let record: String = row
            .try_get("record")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        serde_json::from_str(&record)
            .map_err(|e| RepositoryError::Query(format!("invalid execution JSON: {e}")))
    }
}

impl ExecutionStore for SqliteExecutionStore {
    async fn append(&self, record: &ExecutionRecord) -> Result<(), RepositoryError> {
        let blob = serde_json::to_string(record)
            .map_err(|e| RepositoryError::Query(format!("serialize execution: {e}")))?;

        sqlx::query(
            r#"INSERT INTO executions
               (id, workflow_id, trigger_user_id, success, record, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.workflow_id.to_string())
        .bind(record.trigger_user_id.to_string())
        .bind(record.success as i32)
        .bind(&blob)
        .bind(record.started_at.to_rfc3339())
        .bind(record.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn history(
        &self,
        workflow_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ExecutionRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT record FROM executions
               WHERE workflow_id = ?
               ORDER BY started_at DESC
               LIMIT ?"#,
        )
        .bind(workflow_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn purge_workflow(&self, workflow_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM executions WHERE workflow_id = ?")
            .bind(workflow_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
