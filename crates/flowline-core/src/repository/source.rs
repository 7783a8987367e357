//! Event-source collaborator port.
//!
//! Concrete email/chat/location integrations live outside the core; the
//! trigger manager only depends on this fetch contract.

use flowline_types::error::SourceError;
use flowline_types::event::{FetchBatch, SourceConfig};

/// An external integration the trigger manager polls for candidate events.
///
/// A single implementation routes on `SourceConfig::kind` and
/// `SourceConfig::platform`; the manager passes the per-registration cursor
/// returned by the previous fetch so sources can page incrementally.
pub trait EventSource: Send + Sync {
    /// Fetch a bounded batch of candidate events.
    ///
    /// Errors are transient from the engine's point of view: the polling
    /// cycle logs them and retries on its next interval without claiming
    /// anything.
    fn fetch_candidates(
        &self,
        config: &SourceConfig,
        since_cursor: Option<&str>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<FetchBatch, SourceError>> + Send;
}
