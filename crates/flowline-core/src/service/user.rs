//! User lifecycle: create-on-first-contact and profile updates.

use std::sync::Arc;

use chrono::Utc;
use flowline_types::error::EngineError;
use flowline_types::user::{PlatformIdentity, WorkflowUser};
use uuid::Uuid;

use crate::repository::user::UserStore;

/// User operations over the user store.
///
/// Users come into existence two ways: a sign-in (email known) or an
/// inbound message from an unknown platform identity. Both paths are
/// idempotent -- an existing user is returned unchanged.
pub struct UserService<U> {
    users: Arc<U>,
}

impl<U: UserStore> UserService<U> {
    pub fn new(users: Arc<U>) -> Self {
        Self { users }
    }

    /// Get the user for a platform identity, creating one on first contact.
    pub async fn ensure_platform_user(
        &self,
        identity: PlatformIdentity,
        display_name: &str,
    ) -> Result<WorkflowUser, EngineError> {
        if let Some(existing) = self.users.find_by_platform_identity(&identity).await? {
            return Ok(existing);
        }
        let user = WorkflowUser::from_platform(identity, display_name);
        self.users.upsert(&user).await?;
        tracing::info!(user_id = %user.id, "created user from inbound message");
        Ok(user)
    }

    /// Get the user for an email, creating one on first sign-in.
    pub async fn ensure_signed_in_user(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<WorkflowUser, EngineError> {
        if let Some(existing) = self.users.find_by_email(email).await? {
            return Ok(existing);
        }
        let user = WorkflowUser::from_sign_in(email, display_name);
        self.users.upsert(&user).await?;
        tracing::info!(user_id = %user.id, "created user from sign-in");
        Ok(user)
    }

    /// Update mutable profile fields. The id never changes.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<WorkflowUser, EngineError> {
        let mut user = self
            .users
            .get(user_id)
            .await?
            .ok_or(EngineError::UserNotFound(user_id))?;

        if let Some(name) = display_name {
            user.display_name = name.to_string();
        }
        if let Some(email) = email {
            user.email = Some(email.to_string());
        }
        user.updated_at = Utc::now();
        self.users.upsert(&user).await?;
        Ok(user)
    }

    /// Look up a user by id.
    pub async fn get(&self, user_id: Uuid) -> Result<WorkflowUser, EngineError> {
        self.users
            .get(user_id)
            .await?
            .ok_or(EngineError::UserNotFound(user_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryUserStore;
    use flowline_types::workflow::MessagePlatform;

    fn service() -> UserService<MemoryUserStore> {
        UserService::new(Arc::new(MemoryUserStore::default()))
    }

    fn telegram_identity(id: &str) -> PlatformIdentity {
        PlatformIdentity {
            platform: MessagePlatform::Telegram,
            external_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn first_message_creates_user_second_reuses() {
        let service = service();
        let first = service
            .ensure_platform_user(telegram_identity("12345"), "Alice")
            .await
            .unwrap();
        let second = service
            .ensure_platform_user(telegram_identity("12345"), "Alice Again")
            .await
            .unwrap();
        assert_eq!(first.id, second.id, "same identity, same user");
        assert_eq!(second.display_name, "Alice", "existing user unchanged");
    }

    #[tokio::test]
    async fn first_sign_in_creates_user() {
        let service = service();
        let user = service
            .ensure_signed_in_user("a@example.com", "Alice")
            .await
            .unwrap();
        assert_eq!(user.email.as_deref(), Some("a@example.com"));

        let again = service
            .ensure_signed_in_user("a@example.com", "whoever")
            .await
            .unwrap();
        assert_eq!(user.id, again.id);
    }

    #[tokio::test]
    async fn profile_update_keeps_id() {
        let service = service();
        let user = service
            .ensure_signed_in_user("a@example.com", "Alice")
            .await
            .unwrap();
        let updated = service
            .update_profile(user.id, Some("Alice Liddell"), None)
            .await
            .unwrap();
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.display_name, "Alice Liddell");
        assert_eq!(updated.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let service = service();
        let result = service.update_profile(Uuid::now_v7(), Some("x"), None).await;
        assert!(matches!(result, Err(EngineError::UserNotFound(_))));
    }
}
