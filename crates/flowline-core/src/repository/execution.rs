//! Execution store port.

use flowline_types::error::RepositoryError;
use flowline_types::execution::ExecutionRecord;
use uuid::Uuid;

/// Append-only storage for execution records.
///
/// A record is appended exactly once, after finalization; there is no
/// update operation by design.
pub trait ExecutionStore: Send + Sync {
    /// Append a finalized execution record.
    fn append(
        &self,
        record: &ExecutionRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List the most recent records for a workflow, newest first.
    fn history(
        &self,
        workflow_id: Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionRecord>, RepositoryError>> + Send;

    /// Remove all records for a workflow (cascade on workflow delete).
    fn purge_workflow(
        &self,
        workflow_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
