//! In-memory port implementations and fixtures shared by the crate's tests.
//!
//! These back the engine's generics in unit tests; production code uses the
//! SQLite implementations in flowline-infra.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use flowline_types::error::{ActionError, RepositoryError, SourceError};
use flowline_types::event::{
    EventKey, FetchBatch, RawEvent, SourceConfig, SourceKind, TriggerPayload,
};
use flowline_types::execution::ExecutionRecord;
use flowline_types::user::{PlatformIdentity, WorkflowUser};
use flowline_types::workflow::{
    Action, ActionConfig, AiTransformKind, MessagePlatform, Trigger, TriggerConfig, Workflow,
    WorkflowKind,
};
use serde_json::Value;
use uuid::Uuid;

use crate::engine::action::{ActionHandler, ActionRequest, ActionResponse};
use crate::repository::dedup::DedupLedger;
use crate::repository::execution::ExecutionStore;
use crate::repository::schedule::ScheduleStateStore;
use crate::repository::source::EventSource;
use crate::repository::user::UserStore;
use crate::repository::workflow::WorkflowStore;

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryWorkflowStore {
    inner: Mutex<HashMap<Uuid, Workflow>>,
}

impl MemoryWorkflowStore {
    pub fn insert(&self, workflow: Workflow) {
        self.inner.lock().unwrap().insert(workflow.id, workflow);
    }
}

impl WorkflowStore for MemoryWorkflowStore {
    async fn get(&self, id: Uuid) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.inner.lock().unwrap().get(&id).cloned())
    }

    async fn save(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.insert(workflow.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.inner.lock().unwrap().remove(&id).is_some())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Workflow>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_shared_with(&self, user_id: Uuid) -> Result<Vec<Workflow>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.owner_id != user_id && w.grant_for(user_id).is_some())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Workflow>, RepositoryError> {
        Ok(self.inner.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryExecutionStore {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl MemoryExecutionStore {
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl ExecutionStore for MemoryExecutionStore {
    async fn append(&self, record: &ExecutionRecord) -> Result<(), RepositoryError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn history(
        &self,
        workflow_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ExecutionRecord>, RepositoryError> {
        let mut records: Vec<ExecutionRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        records.reverse();
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn purge_workflow(&self, workflow_id: Uuid) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .unwrap()
            .retain(|r| r.workflow_id != workflow_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDedupLedger {
    claims: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryDedupLedger {
    pub fn claim_count(&self) -> usize {
        self.claims.lock().unwrap().len()
    }
}

impl DedupLedger for MemoryDedupLedger {
    async fn try_claim(&self, key: &EventKey) -> Result<bool, RepositoryError> {
        let mut claims = self.claims.lock().unwrap();
        match claims.contains_key(&key.claim_key()) {
            true => Ok(false),
            false => {
                claims.insert(key.claim_key(), Utc::now());
                Ok(true)
            }
        }
    }

    async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut claims = self.claims.lock().unwrap();
        let before = claims.len();
        claims.retain(|_, claimed_at| *claimed_at >= cutoff);
        Ok((before - claims.len()) as u64)
    }

    async fn purge_workflow(&self, workflow_id: Uuid) -> Result<(), RepositoryError> {
        let suffix = format!(":{workflow_id}");
        self.claims
            .lock()
            .unwrap()
            .retain(|key, _| !key.ends_with(&suffix));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryScheduleState {
    fired: Mutex<HashMap<(Uuid, Uuid), DateTime<Utc>>>,
}

impl ScheduleStateStore for MemoryScheduleState {
    async fn last_fired(
        &self,
        workflow_id: Uuid,
        trigger_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self
            .fired
            .lock()
            .unwrap()
            .get(&(workflow_id, trigger_id))
            .copied())
    }

    async fn record_fired(
        &self,
        workflow_id: Uuid,
        trigger_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.fired
            .lock()
            .unwrap()
            .insert((workflow_id, trigger_id), at);
        Ok(())
    }

    async fn purge_workflow(&self, workflow_id: Uuid) -> Result<(), RepositoryError> {
        self.fired
            .lock()
            .unwrap()
            .retain(|(wf, _), _| *wf != workflow_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, WorkflowUser>>,
}

impl UserStore for MemoryUserStore {
    async fn get(&self, id: Uuid) -> Result<Option<WorkflowUser>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_platform_identity(
        &self,
        identity: &PlatformIdentity,
    ) -> Result<Option<WorkflowUser>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.platform_identity.as_ref() == Some(identity))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<WorkflowUser>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn upsert(&self, user: &WorkflowUser) -> Result<(), RepositoryError> {
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Event source that replays a queue of scripted fetch results.
///
/// An empty queue yields empty batches. Recorded cursors let tests assert
/// incremental paging.
#[derive(Default)]
pub struct ScriptedSource {
    queue: Mutex<VecDeque<Result<FetchBatch, SourceError>>>,
    cursors_seen: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    pub fn push_batch(&self, events: Vec<RawEvent>, next_cursor: Option<&str>) {
        self.queue.lock().unwrap().push_back(Ok(FetchBatch {
            events,
            next_cursor: next_cursor.map(str::to_string),
        }));
    }

    pub fn push_error(&self, error: SourceError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    pub fn cursors_seen(&self) -> Vec<Option<String>> {
        self.cursors_seen.lock().unwrap().clone()
    }
}

impl EventSource for ScriptedSource {
    async fn fetch_candidates(
        &self,
        _config: &SourceConfig,
        since_cursor: Option<&str>,
        _limit: u32,
    ) -> Result<FetchBatch, SourceError> {
        self.cursors_seen
            .lock()
            .unwrap()
            .push(since_cursor.map(str::to_string));
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FetchBatch::default()))
    }
}

/// Action handler that records every request and echoes inputs as outputs.
///
/// Replies and sends return their text; AI transforms return their input.
/// `failing_on_text` makes any request carrying the given text fail.
pub struct ScriptedHandler {
    performed: Mutex<Vec<ActionRequest>>,
    fail_on_text: Option<String>,
}

impl ScriptedHandler {
    pub fn echo() -> Self {
        Self {
            performed: Mutex::new(Vec::new()),
            fail_on_text: None,
        }
    }

    pub fn failing_on_text(text: &str) -> Self {
        Self {
            performed: Mutex::new(Vec::new()),
            fail_on_text: Some(text.to_string()),
        }
    }

    pub fn performed(&self) -> Vec<ActionRequest> {
        self.performed.lock().unwrap().clone()
    }

    /// Texts of performed Reply requests, in order.
    pub fn reply_texts(&self) -> Vec<String> {
        self.performed()
            .into_iter()
            .filter_map(|r| match r {
                ActionRequest::Reply { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Texts of performed SendMessage requests, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.performed()
            .into_iter()
            .filter_map(|r| match r {
                ActionRequest::SendMessage { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ActionHandler for ScriptedHandler {
    async fn perform(&self, request: &ActionRequest) -> Result<ActionResponse, ActionError> {
        self.performed.lock().unwrap().push(request.clone());

        let text = match request {
            ActionRequest::SendMessage { text, .. } | ActionRequest::Reply { text, .. } => {
                text.clone()
            }
            ActionRequest::AiTransform { input, .. } => input.clone(),
        };

        if let Some(bad) = &self.fail_on_text {
            if text.contains(bad.as_str()) {
                return Err(ActionError::Failed("scripted failure".to_string()));
            }
        }

        Ok(ActionResponse { output: Some(text) })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn test_workflow(owner: Uuid, triggers: Vec<Trigger>, actions: Vec<Action>) -> Workflow {
    Workflow {
        id: Uuid::now_v7(),
        name: "test-workflow".to_string(),
        description: None,
        owner_id: owner,
        kind: WorkflowKind::Personal,
        triggers,
        actions,
        shared_with: vec![],
        is_public: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn keyword_trigger(owner: Uuid, keyword: &str) -> Trigger {
    Trigger {
        id: Uuid::now_v7(),
        fetch_user_id: owner,
        config: TriggerConfig::PlatformMessage {
            platform: MessagePlatform::Telegram,
            sender_filter: None,
            keyword_filter: Some(keyword.to_string()),
            command_prefix: None,
        },
    }
}

pub fn manual_trigger(owner: Uuid) -> Trigger {
    Trigger {
        id: Uuid::now_v7(),
        fetch_user_id: owner,
        config: TriggerConfig::Manual {},
    }
}

pub fn schedule_trigger(owner: Uuid, expression: &str) -> Trigger {
    Trigger {
        id: Uuid::now_v7(),
        fetch_user_id: owner,
        config: TriggerConfig::Schedule {
            expression: expression.to_string(),
        },
    }
}

pub fn reply_action(text: &str) -> Action {
    Action::new(
        "reply",
        ActionConfig::Reply {
            text: text.to_string(),
            output_var: None,
        },
    )
}

pub fn transform_action(
    name: &str,
    transform: AiTransformKind,
    input: &str,
    output_var: &str,
) -> Action {
    Action::new(
        name,
        ActionConfig::AiTransform {
            transform,
            input: input.to_string(),
            params: HashMap::new(),
            output_var: output_var.to_string(),
        },
    )
}

pub fn chat_event(id: &str, text: &str) -> RawEvent {
    RawEvent {
        id: id.to_string(),
        source: SourceKind::ChatMessage,
        platform: Some(MessagePlatform::Telegram),
        sender: Some("@alice".to_string()),
        thread_id: Some("c-1".to_string()),
        text: Some(text.to_string()),
        subject: None,
        transition: None,
        dwell_secs: None,
        occurred_at: Utc::now(),
        extra: Value::Null,
    }
}

pub fn chat_payload(text: &str) -> TriggerPayload {
    TriggerPayload::Message {
        event: chat_event("m-1", text),
    }
}
