//! External event types consumed by the trigger subsystem.
//!
//! A [`RawEvent`] is one candidate event fetched from an external
//! integration (chat message, email, location transition). The trigger
//! manager matches raw events against trigger configs, computes a stable
//! [`EventKey`] for deduplication, and wraps qualifying events in a
//! [`TriggerPayload`] for the execution engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::workflow::{GeofenceTransition, MessagePlatform};

// ---------------------------------------------------------------------------
// RawEvent
// ---------------------------------------------------------------------------

/// The external source family an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ChatMessage,
    EmailMessage,
    Location,
}

/// One candidate event fetched from an external integration.
///
/// Field population depends on the source: chat/email events carry text and
/// sender identity; location events carry a geofence transition and dwell
/// time. `extra` holds source-specific fields the core does not interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Source-assigned event id (message id, transition id).
    pub id: String,
    /// Which source family produced the event.
    pub source: SourceKind,
    /// Messaging platform, for chat/email events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<MessagePlatform>,
    /// Sender identity (username, address) as reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Chat/thread id, when the source has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Email subject line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Geofence transition, for location events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<GeofenceTransition>,
    /// Elapsed dwell time in seconds, for dwell transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dwell_secs: Option<u64>,
    /// When the event occurred at the source.
    pub occurred_at: DateTime<Utc>,
    /// Source-specific fields passed through untouched.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
}

// ---------------------------------------------------------------------------
// EventKey
// ---------------------------------------------------------------------------

/// The deduplication identity of one (event, workflow) pair.
///
/// Two polling cycles racing on the same key must produce at most one claim;
/// the ledger's `try_claim` enforces this atomically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// Source-assigned event id.
    pub event_id: String,
    /// Chat/thread id, for chat sources where message ids are only unique
    /// per conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// The workflow claiming the event.
    pub workflow_id: Uuid,
}

impl EventKey {
    /// Build the key for an event/workflow pair.
    pub fn for_event(event: &RawEvent, workflow_id: Uuid) -> Self {
        Self {
            event_id: event.id.clone(),
            thread_id: event.thread_id.clone(),
            workflow_id,
        }
    }

    /// Canonical string form used as the storage claim key.
    pub fn claim_key(&self) -> String {
        match &self.thread_id {
            Some(thread) => format!("{}:{}:{}", self.event_id, thread, self.workflow_id),
            None => format!("{}::{}", self.event_id, self.workflow_id),
        }
    }
}

// ---------------------------------------------------------------------------
// TriggerPayload
// ---------------------------------------------------------------------------

/// What fired a workflow, handed to the execution engine to seed the
/// variable context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerPayload {
    /// A matched chat/email message.
    Message { event: RawEvent },
    /// A matched geofence transition.
    Geofence { event: RawEvent },
    /// A schedule fire.
    Schedule {
        expression: String,
        fired_at: DateTime<Utc>,
    },
    /// A manual invocation with caller-supplied variables.
    Manual {
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        variables: HashMap<String, String>,
    },
}

impl TriggerPayload {
    /// Stable lowercase name recorded on the execution record.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TriggerPayload::Message { .. } => "platform_message",
            TriggerPayload::Geofence { .. } => "geofence",
            TriggerPayload::Schedule { .. } => "schedule",
            TriggerPayload::Manual { .. } => "manual",
        }
    }
}

// ---------------------------------------------------------------------------
// Event source collaborator types
// ---------------------------------------------------------------------------

/// What to fetch from an event source: the source family, the platform
/// (for message sources), and the user on whose behalf events are fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<MessagePlatform>,
    pub user_id: Uuid,
}

/// One bounded batch of candidate events plus the cursor for the next fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchBatch {
    pub events: Vec<RawEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
