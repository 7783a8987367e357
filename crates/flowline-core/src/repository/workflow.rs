//! Workflow store port.

use flowline_types::error::RepositoryError;
use flowline_types::workflow::Workflow;
use uuid::Uuid;

/// Storage interface for workflow definitions.
///
/// The store holds whole workflows; mutation is replace-whole-record. The
/// engine never holds a cross-call lock -- permission checks and validation
/// happen above this trait in the service layer.
pub trait WorkflowStore: Send + Sync {
    /// Get a workflow by id.
    fn get(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// Insert or replace a workflow by id.
    fn save(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a workflow by id. Returns `true` if it existed.
    fn delete(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// List workflows owned by a user.
    fn list_by_owner(
        &self,
        owner_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// List workflows shared with a user (excluding ones they own).
    fn list_shared_with(
        &self,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// List every stored workflow (trigger-registration sweep on startup).
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;
}
