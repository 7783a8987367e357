//! User store port.

use flowline_types::error::RepositoryError;
use flowline_types::user::{PlatformIdentity, WorkflowUser};
use uuid::Uuid;

/// Storage interface for workflow users.
pub trait UserStore: Send + Sync {
    /// Get a user by id.
    fn get(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowUser>, RepositoryError>> + Send;

    /// Find a user by chat-platform identity.
    fn find_by_platform_identity(
        &self,
        identity: &PlatformIdentity,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowUser>, RepositoryError>> + Send;

    /// Find a user by email address.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowUser>, RepositoryError>> + Send;

    /// Insert or replace a user by id.
    fn upsert(
        &self,
        user: &WorkflowUser,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
