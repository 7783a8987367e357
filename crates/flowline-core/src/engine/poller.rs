//! The trigger manager: per-source polling with at-most-once claiming.
//!
//! One lightweight task per source family (chat, email, location) runs a
//! fetch/match/claim/dispatch cycle on its own interval; a schedule ticker
//! fires cron triggers from persisted last-fired state; an eviction task
//! ages out old dedup claims. Qualifying events are handed to a dispatcher
//! callback, which is expected to spawn the execution as an independent
//! task -- the manager never waits on executions.
//!
//! Failure policy: a fetch error ends the cycle early with nothing claimed;
//! a lost claim race is a no-op; neither ever crashes a polling task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use flowline_types::config::EngineConfig;
use flowline_types::error::RepositoryError;
use flowline_types::event::{EventKey, SourceConfig, SourceKind, TriggerPayload};
use flowline_types::workflow::{MessagePlatform, Trigger, TriggerConfig, Workflow};
use futures_util::future::BoxFuture;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::repository::dedup::DedupLedger;
use crate::repository::schedule::ScheduleStateStore;
use crate::repository::source::EventSource;
use crate::repository::workflow::WorkflowStore;

use super::matcher;
use super::schedule::next_occurrence_after;

/// Seconds between dedup-ledger eviction sweeps.
const EVICTION_INTERVAL_SECS: u64 = 900;

// ---------------------------------------------------------------------------
// Dispatch types
// ---------------------------------------------------------------------------

/// A claimed event, ready for execution.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub workflow_id: Uuid,
    pub trigger_user_id: Uuid,
    pub payload: TriggerPayload,
}

/// Callback invoked for each claimed event. Implementations should spawn
/// the execution and return promptly; the manager awaits only the spawn.
pub type Dispatcher = Arc<dyn Fn(DispatchRequest) -> BoxFuture<'static, ()> + Send + Sync>;

// ---------------------------------------------------------------------------
// Cycle bookkeeping
// ---------------------------------------------------------------------------

/// Which polling loop a cycle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollCycleKind {
    Chat,
    Email,
    Location,
}

/// Phase of a polling cycle, re-entered on every interval tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Fetching,
    Matching,
    Dispatching,
}

/// One registered trigger.
#[derive(Debug, Clone)]
pub struct TriggerRegistration {
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub trigger: Trigger,
}

// ---------------------------------------------------------------------------
// TriggerManager
// ---------------------------------------------------------------------------

/// Central registry and polling coordinator for workflow triggers.
///
/// Generic over the event source, dedup ledger, and schedule-state store.
/// Manual triggers are never registered here -- they are invoked directly
/// through the engine and are exempt from deduplication by design.
pub struct TriggerManager<S, L, T> {
    config: EngineConfig,
    source: Arc<S>,
    ledger: Arc<L>,
    schedule_state: Arc<T>,
    dispatcher: Dispatcher,
    /// Registered triggers indexed by workflow id.
    registrations: Arc<RwLock<HashMap<Uuid, Vec<TriggerRegistration>>>>,
    /// Per-trigger fetch cursors.
    cursors: DashMap<Uuid, String>,
    /// Current phase per polling loop.
    phases: DashMap<PollCycleKind, CyclePhase>,
    shutdown: CancellationToken,
    tasks: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl<S, L, T> TriggerManager<S, L, T>
where
    S: EventSource + 'static,
    L: DedupLedger + 'static,
    T: ScheduleStateStore + 'static,
{
    pub fn new(
        config: EngineConfig,
        source: Arc<S>,
        ledger: Arc<L>,
        schedule_state: Arc<T>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            source,
            ledger,
            schedule_state,
            dispatcher,
            registrations: Arc::new(RwLock::new(HashMap::new())),
            cursors: DashMap::new(),
            phases: DashMap::new(),
            shutdown: CancellationToken::new(),
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a workflow's pollable triggers.
    ///
    /// Schedule triggers get a last-fired baseline of "now" on first sight,
    /// so a fresh registration never replays historical occurrences.
    pub async fn register_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let mut regs = Vec::new();
        for trigger in &workflow.triggers {
            if matches!(trigger.config, TriggerConfig::Manual {}) {
                continue;
            }
            if let TriggerConfig::Schedule { .. } = &trigger.config {
                let existing = self
                    .schedule_state
                    .last_fired(workflow.id, trigger.id)
                    .await?;
                if existing.is_none() {
                    self.schedule_state
                        .record_fired(workflow.id, trigger.id, Utc::now())
                        .await?;
                }
            }
            regs.push(TriggerRegistration {
                workflow_id: workflow.id,
                workflow_name: workflow.name.clone(),
                trigger: trigger.clone(),
            });
        }

        let count = regs.len();
        let mut registrations = self.registrations.write().await;
        registrations.insert(workflow.id, regs);

        tracing::info!(
            workflow_id = %workflow.id,
            workflow = workflow.name.as_str(),
            triggers = count,
            "registered workflow triggers"
        );
        Ok(())
    }

    /// Register every stored workflow (startup sweep). Returns the number
    /// of workflows registered.
    pub async fn register_all<WS: WorkflowStore>(
        &self,
        store: &WS,
    ) -> Result<usize, RepositoryError> {
        let workflows = store.list_all().await?;
        for workflow in &workflows {
            self.register_workflow(workflow).await?;
        }
        Ok(workflows.len())
    }

    /// Remove a workflow's triggers and fetch cursors.
    pub async fn unregister_workflow(&self, workflow_id: Uuid) {
        let removed = {
            let mut registrations = self.registrations.write().await;
            registrations.remove(&workflow_id)
        };
        if let Some(regs) = removed {
            for reg in &regs {
                self.cursors.remove(&reg.trigger.id);
            }
            tracing::info!(%workflow_id, "unregistered workflow triggers");
        }
    }

    /// Number of registered workflows.
    pub async fn workflow_count(&self) -> usize {
        self.registrations.read().await.len()
    }

    /// Number of registered (pollable) triggers.
    pub async fn trigger_count(&self) -> usize {
        self.registrations
            .read()
            .await
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Current phase of a polling loop.
    pub fn phase(&self, kind: PollCycleKind) -> CyclePhase {
        self.phases.get(&kind).map(|p| *p).unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Spawn the polling loops, the schedule ticker, and the eviction sweep.
    pub fn start(self: &Arc<Self>) {
        let intervals = [
            (PollCycleKind::Chat, self.config.chat_poll_interval_secs),
            (PollCycleKind::Email, self.config.email_poll_interval_secs),
            (
                PollCycleKind::Location,
                self.config.location_poll_interval_secs,
            ),
        ];

        let mut tasks = self.tasks.lock().unwrap();

        for (kind, secs) in intervals {
            let manager = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = manager.shutdown.cancelled() => break,
                        _ = interval.tick() => manager.run_poll_cycle(kind).await,
                    }
                }
                tracing::debug!(?kind, "polling loop stopped");
            }));
        }

        let manager = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(
                manager.config.schedule_tick_secs.max(1),
            ));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = manager.shutdown.cancelled() => break,
                    _ = interval.tick() => manager.run_schedule_tick().await,
                }
            }
        }));

        let manager = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(EVICTION_INTERVAL_SECS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = manager.shutdown.cancelled() => break,
                    _ = interval.tick() => { manager.evict_expired().await; }
                }
            }
        }));

        tracing::info!("trigger manager started");
    }

    /// Stop all polling tasks and wait for them to exit.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let tasks: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        tracing::info!("trigger manager stopped");
    }

    // -----------------------------------------------------------------------
    // Polling cycles
    // -----------------------------------------------------------------------

    /// Run one fetch/match/claim/dispatch cycle for a source family.
    ///
    /// Exposed for deterministic driving in tests; the spawned loops call
    /// this on their intervals.
    pub async fn run_poll_cycle(&self, kind: PollCycleKind) {
        self.phases.insert(kind, CyclePhase::Fetching);
        let result = self.poll_once(kind).await;
        self.phases.insert(kind, CyclePhase::Idle);
        if let Err(e) = result {
            tracing::warn!(?kind, error = %e, "polling cycle ended early");
        }
    }

    async fn poll_once(&self, kind: PollCycleKind) -> Result<(), flowline_types::error::SourceError> {
        let regs = self.registrations_for(kind).await;
        if regs.is_empty() {
            return Ok(());
        }

        for reg in regs {
            let Some(source_config) = source_config_for(&reg.trigger, kind) else {
                continue;
            };
            let cursor = self.cursors.get(&reg.trigger.id).map(|c| c.value().clone());

            self.phases.insert(kind, CyclePhase::Fetching);
            // A fetch failure ends the whole cycle: no partial claims.
            let batch = self
                .source
                .fetch_candidates(
                    &source_config,
                    cursor.as_deref(),
                    self.config.fetch_batch_limit,
                )
                .await?;

            if let Some(next_cursor) = batch.next_cursor {
                self.cursors.insert(reg.trigger.id, next_cursor);
            }

            self.phases.insert(kind, CyclePhase::Matching);
            for event in batch.events {
                if !matcher::matches(&reg.trigger.config, &event) {
                    continue;
                }

                self.phases.insert(kind, CyclePhase::Dispatching);
                let key = EventKey::for_event(&event, reg.workflow_id);
                match self.ledger.try_claim(&key).await {
                    Ok(true) => {
                        let payload = match event.source {
                            SourceKind::Location => TriggerPayload::Geofence { event },
                            _ => TriggerPayload::Message { event },
                        };
                        self.dispatch(reg.workflow_id, reg.trigger.fetch_user_id, payload)
                            .await;
                    }
                    // Lost the race: another cycle already handled it.
                    Ok(false) => {
                        tracing::debug!(
                            workflow_id = %reg.workflow_id,
                            key = key.claim_key().as_str(),
                            "event already claimed"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            workflow_id = %reg.workflow_id,
                            error = %e,
                            "claim failed, skipping event"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Fire schedule triggers whose next occurrence has elapsed.
    ///
    /// The new last-fired instant is persisted before dispatch, so a crash
    /// between the two can drop a fire but never double-fire.
    pub async fn run_schedule_tick(&self) {
        let now = Utc::now();
        let regs: Vec<TriggerRegistration> = {
            let registrations = self.registrations.read().await;
            registrations
                .values()
                .flatten()
                .filter(|r| matches!(r.trigger.config, TriggerConfig::Schedule { .. }))
                .cloned()
                .collect()
        };

        for reg in regs {
            let TriggerConfig::Schedule { expression } = &reg.trigger.config else {
                continue;
            };

            let last = match self
                .schedule_state
                .last_fired(reg.workflow_id, reg.trigger.id)
                .await
            {
                Ok(Some(last)) => last,
                Ok(None) => {
                    // No baseline yet (registered before this tick saw it).
                    let _ = self
                        .schedule_state
                        .record_fired(reg.workflow_id, reg.trigger.id, now)
                        .await;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        workflow_id = %reg.workflow_id,
                        error = %e,
                        "schedule state read failed"
                    );
                    continue;
                }
            };

            match next_occurrence_after(expression, last) {
                Ok(Some(next)) if next <= now => {
                    if let Err(e) = self
                        .schedule_state
                        .record_fired(reg.workflow_id, reg.trigger.id, now)
                        .await
                    {
                        tracing::warn!(
                            workflow_id = %reg.workflow_id,
                            error = %e,
                            "schedule state write failed, skipping fire"
                        );
                        continue;
                    }
                    tracing::debug!(
                        workflow_id = %reg.workflow_id,
                        %next,
                        "schedule trigger fired"
                    );
                    self.dispatch(
                        reg.workflow_id,
                        reg.trigger.fetch_user_id,
                        TriggerPayload::Schedule {
                            expression: expression.clone(),
                            fired_at: next,
                        },
                    )
                    .await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        workflow_id = %reg.workflow_id,
                        error = %e,
                        "unparseable schedule expression"
                    );
                }
            }
        }
    }

    /// Evict dedup claims older than the configured TTL. Returns the number
    /// of claims removed.
    pub async fn evict_expired(&self) -> u64 {
        let cutoff = Utc::now() - chrono::Duration::hours(self.config.dedup_ttl_hours as i64);
        match self.ledger.evict_older_than(cutoff).await {
            Ok(evicted) => {
                if evicted > 0 {
                    tracing::debug!(evicted, "evicted stale dedup claims");
                }
                evicted
            }
            Err(e) => {
                tracing::warn!(error = %e, "dedup eviction failed");
                0
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn registrations_for(&self, kind: PollCycleKind) -> Vec<TriggerRegistration> {
        let registrations = self.registrations.read().await;
        registrations
            .values()
            .flatten()
            .filter(|reg| cycle_includes(&reg.trigger.config, kind))
            .cloned()
            .collect()
    }

    async fn dispatch(&self, workflow_id: Uuid, trigger_user_id: Uuid, payload: TriggerPayload) {
        tracing::debug!(
            %workflow_id,
            trigger = payload.kind_name(),
            "dispatching claimed event"
        );
        (self.dispatcher)(DispatchRequest {
            workflow_id,
            trigger_user_id,
            payload,
        })
        .await;
    }
}

/// Whether a trigger belongs to a polling loop.
fn cycle_includes(config: &TriggerConfig, kind: PollCycleKind) -> bool {
    match (config, kind) {
        (TriggerConfig::PlatformMessage { platform, .. }, PollCycleKind::Chat) => {
            matches!(platform, MessagePlatform::Telegram | MessagePlatform::WhatsApp)
        }
        (TriggerConfig::PlatformMessage { platform, .. }, PollCycleKind::Email) => {
            matches!(platform, MessagePlatform::Email)
        }
        (TriggerConfig::Geofence { .. }, PollCycleKind::Location) => true,
        _ => false,
    }
}

/// Build the source fetch config for a registered trigger.
fn source_config_for(trigger: &Trigger, kind: PollCycleKind) -> Option<SourceConfig> {
    match (&trigger.config, kind) {
        (TriggerConfig::PlatformMessage { platform, .. }, PollCycleKind::Chat)
        | (TriggerConfig::PlatformMessage { platform, .. }, PollCycleKind::Email) => {
            let source_kind = match platform {
                MessagePlatform::Email => SourceKind::EmailMessage,
                _ => SourceKind::ChatMessage,
            };
            Some(SourceConfig {
                kind: source_kind,
                platform: Some(*platform),
                user_id: trigger.fetch_user_id,
            })
        }
        (TriggerConfig::Geofence { .. }, PollCycleKind::Location) => Some(SourceConfig {
            kind: SourceKind::Location,
            platform: None,
            user_id: trigger.fetch_user_id,
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::executor::WorkflowEngine;
    use crate::testing::{
        MemoryDedupLedger, MemoryExecutionStore, MemoryScheduleState, MemoryWorkflowStore,
        ScriptedHandler, ScriptedSource, chat_event, keyword_trigger, manual_trigger,
        reply_action, schedule_trigger, test_workflow,
    };
    use flowline_types::error::SourceError;
    use std::sync::Mutex;

    type TestManager = TriggerManager<ScriptedSource, MemoryDedupLedger, MemoryScheduleState>;

    struct Harness {
        manager: Arc<TestManager>,
        source: Arc<ScriptedSource>,
        ledger: Arc<MemoryDedupLedger>,
        schedule_state: Arc<MemoryScheduleState>,
        dispatched: Arc<Mutex<Vec<DispatchRequest>>>,
    }

    fn harness(config: EngineConfig) -> Harness {
        let source = Arc::new(ScriptedSource::default());
        let ledger = Arc::new(MemoryDedupLedger::default());
        let schedule_state = Arc::new(MemoryScheduleState::default());
        let dispatched = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&dispatched);
        let dispatcher: Dispatcher = Arc::new(move |request| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().unwrap().push(request);
            })
        });

        let manager = Arc::new(TriggerManager::new(
            config,
            Arc::clone(&source),
            Arc::clone(&ledger),
            Arc::clone(&schedule_state),
            dispatcher,
        ));

        Harness {
            manager,
            source,
            ledger,
            schedule_state,
            dispatched,
        }
    }

    fn dispatch_count(h: &Harness) -> usize {
        h.dispatched.lock().unwrap().len()
    }

    #[tokio::test]
    async fn matching_event_is_claimed_and_dispatched_once() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![keyword_trigger(owner, "invoice")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();

        // The same event shows up in two consecutive fetches.
        h.source.push_batch(vec![chat_event("m-1", "invoice #123")], None);
        h.source.push_batch(vec![chat_event("m-1", "invoice #123")], None);

        h.manager.run_poll_cycle(PollCycleKind::Chat).await;
        h.manager.run_poll_cycle(PollCycleKind::Chat).await;

        assert_eq!(dispatch_count(&h), 1, "at most one dispatch per event");
        assert_eq!(h.ledger.claim_count(), 1);

        let requests = h.dispatched.lock().unwrap();
        assert_eq!(requests[0].workflow_id, wf.id);
        assert_eq!(requests[0].trigger_user_id, owner);
        assert!(matches!(
            requests[0].payload,
            TriggerPayload::Message { .. }
        ));
    }

    #[tokio::test]
    async fn concurrent_cycles_claim_once() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![keyword_trigger(owner, "invoice")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();

        // Both racing cycles fetch the same event id.
        h.source.push_batch(vec![chat_event("m-7", "invoice #7")], None);
        h.source.push_batch(vec![chat_event("m-7", "invoice #7")], None);

        let (a, b) = tokio::join!(
            h.manager.run_poll_cycle(PollCycleKind::Chat),
            h.manager.run_poll_cycle(PollCycleKind::Chat),
        );
        let _ = (a, b);

        assert_eq!(dispatch_count(&h), 1, "two racing cycles, one claim");
    }

    #[tokio::test]
    async fn non_matching_event_is_not_claimed() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![keyword_trigger(owner, "invoice")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();

        h.source.push_batch(vec![chat_event("m-1", "lunch plans?")], None);
        h.manager.run_poll_cycle(PollCycleKind::Chat).await;

        assert_eq!(dispatch_count(&h), 0);
        assert_eq!(h.ledger.claim_count(), 0, "unmatched events never claim");
    }

    #[tokio::test]
    async fn fetch_failure_claims_nothing_and_recovers_next_cycle() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![keyword_trigger(owner, "invoice")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();

        h.source
            .push_error(SourceError::FetchFailed("connection reset".to_string()));
        h.manager.run_poll_cycle(PollCycleKind::Chat).await;
        assert_eq!(dispatch_count(&h), 0);
        assert_eq!(h.ledger.claim_count(), 0, "no partial claims on failure");

        // Transient: the next cycle proceeds normally.
        h.source.push_batch(vec![chat_event("m-2", "invoice #2")], None);
        h.manager.run_poll_cycle(PollCycleKind::Chat).await;
        assert_eq!(dispatch_count(&h), 1);
    }

    #[tokio::test]
    async fn cursor_is_threaded_between_fetches() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![keyword_trigger(owner, "invoice")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();

        h.source.push_batch(vec![], Some("cursor-1"));
        h.source.push_batch(vec![], None);

        h.manager.run_poll_cycle(PollCycleKind::Chat).await;
        h.manager.run_poll_cycle(PollCycleKind::Chat).await;

        assert_eq!(
            h.source.cursors_seen(),
            vec![None, Some("cursor-1".to_string())]
        );
    }

    #[tokio::test]
    async fn manual_triggers_are_not_registered() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![manual_trigger(owner), keyword_trigger(owner, "x")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();

        assert_eq!(h.manager.workflow_count().await, 1);
        assert_eq!(h.manager.trigger_count().await, 1, "manual is not pollable");
    }

    #[tokio::test]
    async fn register_all_sweeps_the_store() {
        let h = harness(EngineConfig::default());
        let store = MemoryWorkflowStore::default();
        let owner = Uuid::now_v7();
        store.insert(test_workflow(
            owner,
            vec![keyword_trigger(owner, "a")],
            vec![reply_action("ok")],
        ));
        store.insert(test_workflow(
            owner,
            vec![schedule_trigger(owner, "every 5 minutes")],
            vec![reply_action("ok")],
        ));

        let registered = h.manager.register_all(&store).await.unwrap();
        assert_eq!(registered, 2);
        assert_eq!(h.manager.workflow_count().await, 2);
    }

    #[tokio::test]
    async fn unregister_removes_triggers_and_cursors() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![keyword_trigger(owner, "x")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();
        h.source.push_batch(vec![], Some("cursor-9"));
        h.manager.run_poll_cycle(PollCycleKind::Chat).await;

        h.manager.unregister_workflow(wf.id).await;
        assert_eq!(h.manager.workflow_count().await, 0);

        // No registrations: the next cycle never touches the source.
        h.manager.run_poll_cycle(PollCycleKind::Chat).await;
        assert_eq!(h.source.cursors_seen().len(), 1);
    }

    // -------------------------------------------------------------------
    // Schedules
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn schedule_registration_seeds_baseline_and_does_not_fire() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![schedule_trigger(owner, "every 1 minutes")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();

        let trigger_id = wf.triggers[0].id;
        assert!(
            h.schedule_state
                .last_fired(wf.id, trigger_id)
                .await
                .unwrap()
                .is_some(),
            "baseline persisted at registration"
        );

        h.manager.run_schedule_tick().await;
        assert_eq!(dispatch_count(&h), 0, "no historical replay");
    }

    #[tokio::test]
    async fn elapsed_schedule_fires_once_and_persists() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![schedule_trigger(owner, "every 1 minutes")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();
        let trigger_id = wf.triggers[0].id;

        // Pretend the last fire was ten minutes ago.
        h.schedule_state
            .record_fired(wf.id, trigger_id, Utc::now() - chrono::Duration::minutes(10))
            .await
            .unwrap();

        h.manager.run_schedule_tick().await;
        assert_eq!(dispatch_count(&h), 1);
        assert!(matches!(
            h.dispatched.lock().unwrap()[0].payload,
            TriggerPayload::Schedule { .. }
        ));

        // The fire moved last_fired forward: an immediate second tick is
        // a no-op.
        h.manager.run_schedule_tick().await;
        assert_eq!(dispatch_count(&h), 1, "no double-fire");
    }

    #[tokio::test]
    async fn eviction_removes_stale_claims() {
        let h = harness(EngineConfig::default());
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![keyword_trigger(owner, "invoice")],
            vec![reply_action("ok")],
        );
        h.manager.register_workflow(&wf).await.unwrap();

        h.source.push_batch(vec![chat_event("m-1", "invoice")], None);
        h.manager.run_poll_cycle(PollCycleKind::Chat).await;
        assert_eq!(h.ledger.claim_count(), 1);

        // Fresh claims survive a TTL sweep.
        assert_eq!(h.manager.evict_expired().await, 0);
        assert_eq!(h.ledger.claim_count(), 1);

        // A cutoff in the future removes everything.
        let removed = h
            .ledger
            .evict_older_than(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(h.ledger.claim_count(), 0);
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let config = EngineConfig {
            chat_poll_interval_secs: 1,
            email_poll_interval_secs: 1,
            location_poll_interval_secs: 1,
            schedule_tick_secs: 1,
            ..EngineConfig::default()
        };
        let h = harness(config);
        h.manager.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.manager.stop().await;
        assert_eq!(h.manager.phase(PollCycleKind::Chat), CyclePhase::Idle);
    }

    // -------------------------------------------------------------------
    // End to end: poll -> claim -> execute
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn claimed_event_flows_through_the_engine() {
        let owner = Uuid::now_v7();
        let wf = test_workflow(
            owner,
            vec![keyword_trigger(owner, "invoice")],
            vec![reply_action("Got: {{trigger_content}}")],
        );
        let wf_id = wf.id;

        let workflows = Arc::new(MemoryWorkflowStore::default());
        workflows.insert(wf.clone());
        let executions = Arc::new(MemoryExecutionStore::default());
        let handler = Arc::new(ScriptedHandler::echo());
        let engine = Arc::new(WorkflowEngine::new(
            Arc::clone(&workflows),
            Arc::clone(&executions),
            Arc::clone(&handler),
        ));

        let source = Arc::new(ScriptedSource::default());
        let ledger = Arc::new(MemoryDedupLedger::default());
        let schedule_state = Arc::new(MemoryScheduleState::default());

        let engine_for_dispatch = Arc::clone(&engine);
        let dispatcher: Dispatcher = Arc::new(move |request| {
            let engine = Arc::clone(&engine_for_dispatch);
            Box::pin(async move {
                // One independent task per dispatched event.
                tokio::spawn(async move {
                    let _ = engine
                        .execute_workflow(
                            request.workflow_id,
                            request.trigger_user_id,
                            request.payload,
                        )
                        .await;
                });
            })
        });

        let manager = Arc::new(TriggerManager::new(
            EngineConfig::default(),
            Arc::clone(&source),
            ledger,
            schedule_state,
            dispatcher,
        ));
        manager.register_workflow(&wf).await.unwrap();

        source.push_batch(vec![chat_event("m-1", "invoice #123")], None);
        manager.run_poll_cycle(PollCycleKind::Chat).await;

        // Wait for the spawned execution to land.
        let mut tries = 0;
        while executions.records().is_empty() && tries < 100 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tries += 1;
        }

        let records = executions.records();
        assert_eq!(records.len(), 1, "exactly one execution record");
        assert_eq!(records[0].workflow_id, wf_id);
        assert!(records[0].success);
        assert_eq!(
            handler.reply_texts(),
            vec!["Got: invoice #123".to_string()]
        );
    }
}
