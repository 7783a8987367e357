//! Workflow user identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::MessagePlatform;

/// A user of the automation engine.
///
/// Created on first sign-in or on the first inbound message from an unknown
/// platform identity. The id is immutable; profile fields may change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowUser {
    /// UUIDv7, assigned at creation, never changes.
    pub id: Uuid,
    /// Email address, when known (sign-in users).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name shown in logs and sharing UIs.
    pub display_name: String,
    /// Chat-platform identity, when the user was first seen via a message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_identity: Option<PlatformIdentity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowUser {
    /// Create a user from a sign-in (email known, no platform identity).
    pub fn from_sign_in(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: Some(email.into()),
            display_name: display_name.into(),
            platform_identity: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a user from an inbound message on a platform.
    pub fn from_platform(identity: PlatformIdentity, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: None,
            display_name: display_name.into(),
            platform_identity: Some(identity),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A user's identity on a messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformIdentity {
    pub platform: MessagePlatform,
    /// The platform's own user id (chat id, address).
    pub external_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_user_has_email_no_platform() {
        let user = WorkflowUser::from_sign_in("a@example.com", "Alice");
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        assert!(user.platform_identity.is_none());
    }

    #[test]
    fn platform_user_has_identity_no_email() {
        let user = WorkflowUser::from_platform(
            PlatformIdentity {
                platform: MessagePlatform::Telegram,
                external_id: "12345".to_string(),
            },
            "Bob",
        );
        assert!(user.email.is_none());
        let identity = user.platform_identity.unwrap();
        assert_eq!(identity.platform, MessagePlatform::Telegram);
        assert_eq!(identity.external_id, "12345");
    }

    #[test]
    fn user_json_roundtrip() {
        let user = WorkflowUser::from_sign_in("a@example.com", "Alice");
        let json = serde_json::to_string(&user).unwrap();
        let parsed: WorkflowUser = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, user.id);
        assert_eq!(parsed.display_name, "Alice");
    }
}
