//! Error taxonomy for the engine and its collaborators.

use thiserror::Error;
use uuid::Uuid;

use crate::validation::ValidationIssue;
use crate::workflow::Capability;

/// Errors returned by the top-level engine APIs.
///
/// Per-action failures are NOT represented here -- they are captured inside
/// the execution record and the run continues or halts per the action's
/// policy. Only permission and not-found conditions abort a call early.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("user {user_id} lacks {capability} capability")]
    PermissionDenied { user_id: Uuid, capability: Capability },

    #[error("validation failed with {} issue(s)", .0.len())]
    ValidationFailed(Vec<ValidationIssue>),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// Errors from storage port operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from event-source collaborators.
///
/// Always transient from the engine's point of view: the polling cycle logs
/// the failure and retries on its next interval, claiming nothing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Errors from action-handler collaborators.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action failed: {0}")]
    Failed(String),

    #[error("action unsupported by handler: {0}")]
    Unsupported(String),
}
