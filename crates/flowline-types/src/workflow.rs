//! Workflow domain types for Flowline.
//!
//! A `Workflow` bundles one or more [`Trigger`]s (conditions on external
//! events) with an ordered chain of [`Action`]s executed against a mutable
//! variable context. Workflows belong to a user, may be shared with others
//! under granular capability grants, and come in two kinds: personal
//! (single-user) and cross-user.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A user-defined automation: triggers plus an ordered action chain.
///
/// Created by its owner, mutated only through validated update operations,
/// deleted explicitly (which cascades to dedup claims and execution history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// UUIDv7 assigned on first save.
    pub id: Uuid,
    /// Human-readable workflow name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The user who owns this workflow. Always holds every capability.
    pub owner_id: Uuid,
    /// Personal (single-user) or cross-user.
    pub kind: WorkflowKind,
    /// Trigger configurations. Each carries the user on whose behalf
    /// external events are fetched.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Ordered action chain; position defines execution order.
    pub actions: Vec<Action>,
    /// Users this workflow is shared with. Sharing implies execute;
    /// edit requires the explicit flag on the grant.
    #[serde(default)]
    pub shared_with: Vec<ShareGrant>,
    /// Publicly viewable (view only -- never implies execute/edit).
    #[serde(default)]
    pub is_public: bool,
    /// When the workflow was created.
    pub created_at: DateTime<Utc>,
    /// When the workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Look up the share grant for a user, if any.
    pub fn grant_for(&self, user_id: Uuid) -> Option<&ShareGrant> {
        self.shared_with.iter().find(|g| g.user_id == user_id)
    }
}

/// Whether a workflow operates on behalf of a single user or across users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Personal,
    CrossUser,
}

/// A sharing entry: the user gains view + execute; edit only when flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    /// The user the workflow is shared with.
    pub user_id: Uuid,
    /// Whether this user may modify the workflow.
    #[serde(default)]
    pub can_edit: bool,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A named permission checked against a user and a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    Execute,
    Edit,
    Delete,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::View => write!(f, "view"),
            Capability::Execute => write!(f, "execute"),
            Capability::Edit => write!(f, "edit"),
            Capability::Delete => write!(f, "delete"),
        }
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// A declared condition that starts a workflow execution when satisfied by
/// an external event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Stable trigger id, unique within the workflow.
    pub id: Uuid,
    /// The user on whose behalf candidate events are fetched.
    pub fetch_user_id: Uuid,
    /// The trigger condition.
    pub config: TriggerConfig,
}

/// How a workflow can be triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// A message received on a chat/email platform.
    ///
    /// Every filter is optional; an absent filter matches all events of the
    /// source type (intentional permissiveness -- the validator surfaces a
    /// warning for fully unfiltered triggers).
    PlatformMessage {
        platform: MessagePlatform,
        /// Match when the event sender equals or contains this value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_filter: Option<String>,
        /// Case-insensitive substring match against the message text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyword_filter: Option<String>,
        /// Match when the message text starts with this prefix.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command_prefix: Option<String>,
    },
    /// Fires on a cron-like schedule.
    Schedule {
        /// Cron expression or human-readable schedule string
        /// (e.g. "every 5 minutes").
        expression: String,
    },
    /// Manually invoked via the engine API. Exempt from deduplication.
    Manual {},
    /// Fires on a geofence transition.
    Geofence {
        latitude: f64,
        longitude: f64,
        /// Fence radius in meters.
        radius_m: f64,
        /// Which transition fires the trigger.
        transition: GeofenceTransition,
        /// Minimum dwell time in seconds (Dwell transitions only).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dwell_secs: Option<u64>,
    },
}

impl TriggerConfig {
    /// Stable lowercase name for logging and execution records.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TriggerConfig::PlatformMessage { .. } => "platform_message",
            TriggerConfig::Schedule { .. } => "schedule",
            TriggerConfig::Manual {} => "manual",
            TriggerConfig::Geofence { .. } => "geofence",
        }
    }
}

/// Messaging platforms the engine can poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePlatform {
    Telegram,
    WhatsApp,
    Email,
}

impl std::fmt::Display for MessagePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessagePlatform::Telegram => write!(f, "telegram"),
            MessagePlatform::WhatsApp => write!(f, "whatsapp"),
            MessagePlatform::Email => write!(f, "email"),
        }
    }
}

/// Geofence transition kinds, tagged on incoming location events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceTransition {
    Enter,
    Exit,
    Dwell,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// One step of a workflow's execution chain.
///
/// Actions are positional; the index in `Workflow::actions` defines the
/// strict execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Human-readable action name (for outcomes and logs).
    pub name: String,
    /// When true, a failure of this action marks the whole execution as
    /// failed; later actions still run. Defaults depend on the action kind
    /// (see [`ActionConfig::default_halt_on_failure`]).
    pub halt_on_failure: bool,
    /// The action payload.
    pub config: ActionConfig,
}

impl Action {
    /// Build an action with the kind-default halt policy.
    pub fn new(name: impl Into<String>, config: ActionConfig) -> Self {
        let halt_on_failure = config.default_halt_on_failure();
        Self {
            name: name.into(),
            halt_on_failure,
            config,
        }
    }
}

/// Action payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Send a message on a platform. `text` and `target` support
    /// `{{variable}}` templates.
    SendMessage {
        platform: MessagePlatform,
        /// Destination address (chat id, phone number, email address).
        target: String,
        /// The recipient as a workflow user, when known. Personal
        /// workflows must not target users other than the owner.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_user_id: Option<Uuid>,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_var: Option<String>,
    },
    /// Reply to the triggering message. `text` supports templates.
    Reply {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_var: Option<String>,
    },
    /// Derive a value from the context via the AI collaborator.
    AiTransform {
        transform: AiTransformKind,
        /// Input template, usually `{{trigger_content}}`.
        input: String,
        /// Transform-specific parameters (e.g. target language).
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        params: HashMap<String, String>,
        /// Variable name the result is stored under.
        output_var: String,
    },
    /// Suspend this execution (and only this execution) for a duration.
    Delay { duration_secs: u64 },
    /// Evaluate a boolean expression against the variable context and run
    /// one of two sub-actions before continuing the main chain.
    Conditional {
        condition: String,
        then_action: Box<Action>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_action: Option<Box<Action>>,
    },
}

impl ActionConfig {
    /// Stable lowercase name for logging and execution records.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ActionConfig::SendMessage { .. } => "send_message",
            ActionConfig::Reply { .. } => "reply",
            ActionConfig::AiTransform { .. } => "ai_transform",
            ActionConfig::Delay { .. } => "delay",
            ActionConfig::Conditional { .. } => "conditional",
        }
    }

    /// Kind-default halt policy: AI transforms halt on failure because later
    /// actions consume their output variable; everything else continues.
    pub fn default_halt_on_failure(&self) -> bool {
        matches!(self, ActionConfig::AiTransform { .. })
    }

    /// The output variable this action declares, if any.
    pub fn output_var(&self) -> Option<&str> {
        match self {
            ActionConfig::SendMessage { output_var, .. }
            | ActionConfig::Reply { output_var, .. } => output_var.as_deref(),
            ActionConfig::AiTransform { output_var, .. } => Some(output_var),
            ActionConfig::Delay { .. } | ActionConfig::Conditional { .. } => None,
        }
    }
}

/// AI-derived transformations available to workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTransformKind {
    Analyze,
    Summarize,
    Translate,
    SmartReply,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
