//! SQLite schedule-state store.

use chrono::{DateTime, Utc};
use flowline_core::repository::schedule::ScheduleStateStore;
use flowline_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ScheduleStateStore`.
pub struct SqliteScheduleStateStore {
    pool: DatabasePool,
}

impl SqliteScheduleStateStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl ScheduleStateStore for SqliteScheduleStateStore {
    async fn last_fired(
        &self,
        workflow_id: Uuid,
        trigger_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let row = sqlx::query(
            "SELECT last_fired FROM schedule_state WHERE workflow_id = ? AND trigger_id = ?",
        )
        .bind(workflow_id.to_string())
        .bind(trigger_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let text: String = row
                    .try_get("last_fired")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let parsed = DateTime::parse_from_rfc3339(&text)
                    .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    async fn record_fired(
        &self,
        workflow_id: Uuid,
        trigger_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO schedule_state (workflow_id, trigger_id, last_fired)
               VALUES (?, ?, ?)
               ON CONFLICT(workflow_id, trigger_id) DO UPDATE SET
                 last_fired = excluded.last_fired"#,
        )
        .bind(workflow_id.to_string())
        .bind(trigger_id.to_string())
        .bind(at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn purge_workflow(&self, workflow_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM schedule_state WHERE workflow_id = ?")
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
