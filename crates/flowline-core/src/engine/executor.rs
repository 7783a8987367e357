//! The execution orchestrator.
//!
//! `WorkflowEngine::execute_workflow` runs one workflow against one trigger
//! payload: load, permission gate, validator gate, seed the variable
//! context, then execute the action chain strictly in order. Per-action
//! failures are captured in the execution record and the chain continues
//! unless the failing action is marked halting. The finalized record is
//! appended to the execution store exactly once.
//!
//! Each execution is an independent task with its own context and
//! cancellation token; nothing here blocks the trigger manager or other
//! concurrent executions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use flowline_types::error::EngineError;
use flowline_types::event::TriggerPayload;
use flowline_types::execution::{ActionOutcome, ActionStatus, BranchTaken, ExecutionRecord};
use flowline_types::validation::passes;
use flowline_types::workflow::{Action, ActionConfig, Capability};
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::repository::execution::ExecutionStore;
use crate::repository::workflow::WorkflowStore;

use super::action::{ActionHandler, resolve_request};
use super::context::VariableContext;
use super::expression::ConditionEvaluator;
use super::permission::has_capability;
use super::validator::validate;

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Executes workflows against trigger payloads.
///
/// Generic over the workflow store, execution store, and action handler so
/// tests run against in-memory ports and production runs against SQLite +
/// real transports. All collaborators are injected; the engine holds no
/// ambient global state.
pub struct WorkflowEngine<W, E, H> {
    workflows: Arc<W>,
    executions: Arc<E>,
    handler: Arc<H>,
    evaluator: ConditionEvaluator,
    /// Cancellation tokens keyed by execution id.
    cancellations: DashMap<Uuid, CancellationToken>,
}

/// Internal per-action result: the recorded outcome plus whether a failure
/// counts against overall success.
struct ActionResult {
    outcome: ActionOutcome,
    halting_failure: bool,
}

impl<W, E, H> WorkflowEngine<W, E, H>
where
    W: WorkflowStore,
    E: ExecutionStore,
    H: ActionHandler,
{
    pub fn new(workflows: Arc<W>, executions: Arc<E>, handler: Arc<H>) -> Self {
        Self {
            workflows,
            executions,
            handler,
            evaluator: ConditionEvaluator::new(),
            cancellations: DashMap::new(),
        }
    }

    /// Execute a workflow as `trigger_user_id`, seeded from `payload`.
    ///
    /// Fails early (no record written) only for not-found, permission, and
    /// validation errors; action failures are captured inside the record.
    pub async fn execute_workflow(
        &self,
        workflow_id: Uuid,
        trigger_user_id: Uuid,
        payload: TriggerPayload,
    ) -> Result<ExecutionRecord, EngineError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;

        if !has_capability(trigger_user_id, &workflow, Capability::Execute) {
            // Audit entry only; no partial execution record for a denial.
            tracing::warn!(
                workflow_id = %workflow_id,
                user_id = %trigger_user_id,
                "execute denied"
            );
            return Err(EngineError::PermissionDenied {
                user_id: trigger_user_id,
                capability: Capability::Execute,
            });
        }

        let issues = validate(&workflow);
        if !passes(&issues) {
            return Err(EngineError::ValidationFailed(issues));
        }

        let execution_id = Uuid::now_v7();
        let cancel_token = CancellationToken::new();
        self.cancellations.insert(execution_id, cancel_token.clone());

        tracing::info!(
            execution_id = %execution_id,
            workflow_id = %workflow_id,
            trigger = payload.kind_name(),
            "starting execution"
        );

        let mut ctx = VariableContext::seeded_from(&payload);
        let mut record = ExecutionRecord {
            id: execution_id,
            workflow_id,
            trigger_user_id,
            trigger_kind: payload.kind_name().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            success: false,
            outcomes: Vec::with_capacity(workflow.actions.len()),
            message: String::new(),
        };

        let mut cancelled = false;
        let mut halting_failures = 0usize;
        let mut failures = 0usize;

        for (position, action) in workflow.actions.iter().enumerate() {
            // Cancellation is honored between actions; an in-flight dispatch
            // is never interrupted.
            if cancel_token.is_cancelled() {
                cancelled = true;
                record.outcomes.push(skipped_outcome(position, action));
                continue;
            }

            let result = self.run_action(position, action, &mut ctx).await;
            if result.outcome.status == ActionStatus::Failed {
                failures += 1;
                if result.halting_failure {
                    halting_failures += 1;
                }
            }
            record.outcomes.push(result.outcome);
        }

        self.cancellations.remove(&execution_id);

        record.completed_at = Some(Utc::now());
        record.success = !cancelled && halting_failures == 0;
        record.message = if cancelled {
            let ran = record
                .outcomes
                .iter()
                .filter(|o| o.status != ActionStatus::Skipped)
                .count();
            format!("cancelled after {ran} of {} actions", workflow.actions.len())
        } else if failures == 0 {
            format!("all {} actions succeeded", workflow.actions.len())
        } else {
            format!("{failures} of {} actions failed", workflow.actions.len())
        };

        self.executions.append(&record).await?;

        tracing::info!(
            execution_id = %execution_id,
            success = record.success,
            actions = record.outcomes.len(),
            "execution finished"
        );

        Ok(record)
    }

    /// Cancel a running execution. The current action finishes; everything
    /// after it is recorded as skipped. Returns `false` when the execution
    /// is unknown or already finished.
    pub fn cancel(&self, execution_id: Uuid) -> bool {
        match self.cancellations.get(&execution_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(execution_id = %execution_id, "execution cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Ids of executions currently in flight.
    pub fn running(&self) -> Vec<Uuid> {
        self.cancellations.iter().map(|e| *e.key()).collect()
    }

    /// Whether `user_id` holds `capability` on the stored workflow.
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
        capability: Capability,
    ) -> Result<bool, EngineError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
        Ok(has_capability(user_id, &workflow, capability))
    }

    // -----------------------------------------------------------------------
    // Action execution
    // -----------------------------------------------------------------------

    /// Run one action against the context. Boxed because conditionals
    /// recurse into their branch action.
    fn run_action<'a>(
        &'a self,
        position: usize,
        action: &'a Action,
        ctx: &'a mut VariableContext,
    ) -> BoxFuture<'a, ActionResult> {
        Box::pin(async move {
            match &action.config {
                ActionConfig::Delay { duration_secs } => {
                    tracing::debug!(position, secs = duration_secs, "delay action");
                    tokio::time::sleep(Duration::from_secs(*duration_secs)).await;
                    ActionResult {
                        outcome: ActionOutcome {
                            position,
                            action_name: action.name.clone(),
                            kind: action.config.kind_name().to_string(),
                            status: ActionStatus::Succeeded,
                            output_var: None,
                            error: None,
                            warnings: vec![],
                            branch: None,
                        },
                        halting_failure: false,
                    }
                }
                ActionConfig::Conditional {
                    condition,
                    then_action,
                    else_action,
                } => {
                    self.run_conditional(position, action, condition, then_action, else_action.as_deref(), ctx)
                        .await
                }
                _ => self.run_external(position, action, ctx).await,
            }
        })
    }

    async fn run_conditional(
        &self,
        position: usize,
        action: &Action,
        condition: &str,
        then_action: &Action,
        else_action: Option<&Action>,
        ctx: &mut VariableContext,
    ) -> ActionResult {
        let mut outcome = ActionOutcome {
            position,
            action_name: action.name.clone(),
            kind: action.config.kind_name().to_string(),
            status: ActionStatus::Succeeded,
            output_var: None,
            error: None,
            warnings: vec![],
            branch: None,
        };

        let condition_met = match self.evaluator.evaluate_condition(condition, ctx) {
            Ok(met) => met,
            Err(e) => {
                outcome.status = ActionStatus::Failed;
                outcome.error = Some(e.to_string());
                return ActionResult {
                    outcome,
                    halting_failure: action.halt_on_failure,
                };
            }
        };

        let branch = if condition_met {
            outcome.branch = Some(BranchTaken::Then);
            Some(then_action)
        } else if let Some(else_action) = else_action {
            outcome.branch = Some(BranchTaken::Else);
            Some(else_action)
        } else {
            outcome.branch = Some(BranchTaken::None);
            None
        };

        if let Some(branch_action) = branch {
            let nested = self.run_action(position, branch_action, ctx).await;
            outcome.status = nested.outcome.status;
            outcome.output_var = nested.outcome.output_var;
            outcome.error = nested
                .outcome
                .error
                .map(|e| format!("{}: {e}", branch_action.name));
            outcome.warnings = nested.outcome.warnings;
            if outcome.status == ActionStatus::Failed {
                // A branch failure halts when either the conditional or the
                // branch action is marked halting.
                return ActionResult {
                    halting_failure: action.halt_on_failure || branch_action.halt_on_failure,
                    outcome,
                };
            }
        }

        ActionResult {
            outcome,
            halting_failure: false,
        }
    }

    async fn run_external(
        &self,
        position: usize,
        action: &Action,
        ctx: &mut VariableContext,
    ) -> ActionResult {
        let mut outcome = ActionOutcome {
            position,
            action_name: action.name.clone(),
            kind: action.config.kind_name().to_string(),
            status: ActionStatus::Succeeded,
            output_var: action.config.output_var().map(str::to_string),
            error: None,
            warnings: vec![],
            branch: None,
        };

        // resolve_request only returns None for in-process actions, which
        // run_action dispatches elsewhere.
        let Some(resolved) = resolve_request(&action.config, ctx) else {
            outcome.status = ActionStatus::Failed;
            outcome.error = Some("action kind has no handler dispatch".to_string());
            return ActionResult {
                outcome,
                halting_failure: action.halt_on_failure,
            };
        };
        outcome.warnings = resolved.warnings;

        match self.handler.perform(&resolved.request).await {
            Ok(response) => {
                // Last write wins on output variables.
                if let Some(output_var) = action.config.output_var() {
                    ctx.set(output_var, response.output.unwrap_or_default());
                }
                ActionResult {
                    outcome,
                    halting_failure: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    position,
                    action = action.name.as_str(),
                    error = %e,
                    "action failed"
                );
                outcome.status = ActionStatus::Failed;
                outcome.error = Some(e.to_string());
                ActionResult {
                    outcome,
                    halting_failure: action.halt_on_failure,
                }
            }
        }
    }
}

fn skipped_outcome(position: usize, action: &Action) -> ActionOutcome {
    ActionOutcome {
        position,
        action_name: action.name.clone(),
        kind: action.config.kind_name().to_string(),
        status: ActionStatus::Skipped,
        output_var: None,
        error: None,
        warnings: vec![],
        branch: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
