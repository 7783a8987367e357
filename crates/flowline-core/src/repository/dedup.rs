//! Deduplication ledger port.

use chrono::{DateTime, Utc};
use flowline_types::error::RepositoryError;
use flowline_types::event::EventKey;
use uuid::Uuid;

/// Durable set of already-claimed (event, workflow) pairs.
///
/// The engine treats this as a set with at-most-one-insert semantics:
/// `try_claim` must be atomic under concurrent pollers -- two cycles racing
/// on the same key must not both observe `true`. Records are never updated,
/// only inserted and eventually evicted.
pub trait DedupLedger: Send + Sync {
    /// Atomically insert a claim. Returns `true` iff this call made the
    /// first claim for the key.
    fn try_claim(
        &self,
        key: &EventKey,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Remove claims older than the given instant (TTL eviction).
    fn evict_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Remove all claims for a workflow (cascade on workflow delete).
    fn purge_workflow(
        &self,
        workflow_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
