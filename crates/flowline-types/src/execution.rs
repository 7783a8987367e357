//! Execution audit types.
//!
//! An [`ExecutionRecord`] is the immutable audit trail of one workflow run:
//! timestamps, overall success, and one [`ActionOutcome`] per action in the
//! chain. Records are accumulated in memory while the run is in flight and
//! appended to the execution store exactly once at finalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// The audit trail of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// UUIDv7 execution id.
    pub id: Uuid,
    /// The workflow that ran.
    pub workflow_id: Uuid,
    /// The user the execution ran as.
    pub trigger_user_id: Uuid,
    /// What fired the run ("platform_message", "schedule", ...).
    pub trigger_kind: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished (None only while in flight).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// True iff every halting-capable action succeeded and the run was not
    /// cancelled.
    pub success: bool,
    /// One outcome per executed action, in chain order.
    pub outcomes: Vec<ActionOutcome>,
    /// Human-readable summary of the run.
    pub message: String,
}

/// Outcome of one action within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Zero-based position in the action chain.
    pub position: usize,
    /// The action's display name.
    pub action_name: String,
    /// The action kind ("send_message", "delay", ...).
    pub kind: String,
    /// How the action ended.
    pub status: ActionStatus,
    /// The variable the action's output was stored under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_var: Option<String>,
    /// Error message, for failed actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal notes, e.g. unresolved template placeholders.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// For conditionals: which branch ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchTaken>,
}

/// Terminal status of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed,
    /// Not executed (run cancelled before this action).
    Skipped,
}

/// Which branch a conditional action selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchTaken {
    Then,
    Else,
    /// Condition false and no else branch configured.
    None,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
