//! Schedule-state store port.

use chrono::{DateTime, Utc};
use flowline_types::error::RepositoryError;
use uuid::Uuid;

/// Persistence for the last-fired instant of each scheduled trigger.
///
/// Keeping this durable is what prevents double-fires across process
/// restarts: the ticker only dispatches occurrences strictly after the
/// stored instant.
pub trait ScheduleStateStore: Send + Sync {
    /// The last recorded fire time for a trigger, if any.
    fn last_fired(
        &self,
        workflow_id: Uuid,
        trigger_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<DateTime<Utc>>, RepositoryError>> + Send;

    /// Record a fire (or the initial baseline) for a trigger.
    fn record_fired(
        &self,
        workflow_id: Uuid,
        trigger_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove schedule state for a workflow (cascade on workflow delete).
    fn purge_workflow(
        &self,
        workflow_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
