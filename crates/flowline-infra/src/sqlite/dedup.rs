//! SQLite deduplication ledger.
//!
//! The atomic first-claim test is `INSERT OR IGNORE` against the
//! primary-keyed claim string through the single-writer pool: exactly one
//! of any number of racing claims observes `rows_affected() == 1`.

use chrono::{DateTime, Utc};
use flowline_core::repository::dedup::DedupLedger;
use flowline_types::error::RepositoryError;
use flowline_types::event::EventKey;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DedupLedger`.
pub struct SqliteDedupLedger {
    pool: DatabasePool,
}

impl SqliteDedupLedger {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl DedupLedger for SqliteDedupLedger {
    async fn try_claim(&self, key: &EventKey) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO dedup_claims (claim_key, workflow_id, claimed_at) \
             VALUES (?, ?, ?)",
        )
        .bind(key.claim_key())
        .bind(key.workflow_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM dedup_claims WHERE claimed_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn purge_workflow(&self, workflow_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM dedup_claims WHERE workflow_id = ?")
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
