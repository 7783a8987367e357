//! Workflow CRUD with capability checks and cascade deletes.
//!
//! Every mutation is gated by the permission model and the validator; a
//! denied or invalid request leaves the store untouched. Deleting a
//! workflow cascades to its dedup claims, schedule state, and execution
//! history.

use std::sync::Arc;

use chrono::Utc;
use flowline_types::error::EngineError;
use flowline_types::execution::ExecutionRecord;
use flowline_types::validation::{ValidationIssue, passes};
use flowline_types::workflow::{Capability, Workflow};
use uuid::Uuid;

use crate::engine::permission::has_capability;
use crate::engine::validator::validate;
use crate::repository::dedup::DedupLedger;
use crate::repository::execution::ExecutionStore;
use crate::repository::schedule::ScheduleStateStore;
use crate::repository::workflow::WorkflowStore;

/// Permission-gated workflow operations.
pub struct WorkflowService<W, E, L, T> {
    workflows: Arc<W>,
    executions: Arc<E>,
    ledger: Arc<L>,
    schedule_state: Arc<T>,
}

impl<W, E, L, T> WorkflowService<W, E, L, T>
where
    W: WorkflowStore,
    E: ExecutionStore,
    L: DedupLedger,
    T: ScheduleStateStore,
{
    pub fn new(
        workflows: Arc<W>,
        executions: Arc<E>,
        ledger: Arc<L>,
        schedule_state: Arc<T>,
    ) -> Self {
        Self {
            workflows,
            executions,
            ledger,
            schedule_state,
        }
    }

    /// Validate a workflow without touching storage.
    pub fn validate_workflow(&self, workflow: &Workflow) -> Vec<ValidationIssue> {
        validate(workflow)
    }

    /// Create a workflow. The creator is the owner; validation errors block
    /// the save.
    pub async fn create(&self, mut workflow: Workflow) -> Result<Workflow, EngineError> {
        let issues = validate(&workflow);
        if !passes(&issues) {
            return Err(EngineError::ValidationFailed(issues));
        }
        let now = Utc::now();
        workflow.created_at = now;
        workflow.updated_at = now;
        self.workflows.save(&workflow).await?;
        tracing::info!(
            workflow_id = %workflow.id,
            owner_id = %workflow.owner_id,
            "workflow created"
        );
        Ok(workflow)
    }

    /// Update a workflow as `actor`.
    ///
    /// Requires the edit capability on the *stored* workflow; owner and
    /// creation time are immutable. The store is untouched on denial or
    /// validation failure.
    pub async fn update(
        &self,
        actor: Uuid,
        mut workflow: Workflow,
    ) -> Result<Workflow, EngineError> {
        let current = self
            .workflows
            .get(workflow.id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow.id))?;

        if !has_capability(actor, &current, Capability::Edit) {
            tracing::warn!(
                workflow_id = %workflow.id,
                user_id = %actor,
                "edit denied"
            );
            return Err(EngineError::PermissionDenied {
                user_id: actor,
                capability: Capability::Edit,
            });
        }

        let issues = validate(&workflow);
        if !passes(&issues) {
            return Err(EngineError::ValidationFailed(issues));
        }

        workflow.owner_id = current.owner_id;
        workflow.created_at = current.created_at;
        workflow.updated_at = Utc::now();
        self.workflows.save(&workflow).await?;
        tracing::info!(workflow_id = %workflow.id, "workflow updated");
        Ok(workflow)
    }

    /// Delete a workflow as `actor` (owner only). Cascades to dedup claims,
    /// schedule state, and execution history.
    pub async fn delete(&self, actor: Uuid, workflow_id: Uuid) -> Result<(), EngineError> {
        let current = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;

        if !has_capability(actor, &current, Capability::Delete) {
            tracing::warn!(
                workflow_id = %workflow_id,
                user_id = %actor,
                "delete denied"
            );
            return Err(EngineError::PermissionDenied {
                user_id: actor,
                capability: Capability::Delete,
            });
        }

        self.workflows.delete(workflow_id).await?;
        self.ledger.purge_workflow(workflow_id).await?;
        self.schedule_state.purge_workflow(workflow_id).await?;
        self.executions.purge_workflow(workflow_id).await?;
        tracing::info!(workflow_id = %workflow_id, "workflow deleted");
        Ok(())
    }

    /// Fetch a workflow as `actor` (requires view).
    pub async fn get(&self, actor: Uuid, workflow_id: Uuid) -> Result<Workflow, EngineError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;

        if !has_capability(actor, &workflow, Capability::View) {
            return Err(EngineError::PermissionDenied {
                user_id: actor,
                capability: Capability::View,
            });
        }
        Ok(workflow)
    }

    /// Workflows a user owns plus those shared with them.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Workflow>, EngineError> {
        let mut workflows = self.workflows.list_by_owner(user_id).await?;
        workflows.extend(self.workflows.list_shared_with(user_id).await?);
        Ok(workflows)
    }

    /// Execution history for a workflow as `actor` (requires view).
    pub async fn history(
        &self,
        actor: Uuid,
        workflow_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ExecutionRecord>, EngineError> {
        // View gate piggybacks on get().
        self.get(actor, workflow_id).await?;
        Ok(self.executions.history(workflow_id, limit).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
