//! Engine configuration.
//!
//! Loaded from `{data_dir}/config.toml` by the infrastructure layer; every
//! field has a default so a missing or partial file still yields a working
//! engine.

use serde::{Deserialize, Serialize};

/// Polling intervals, batch limits, and retention knobs for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between chat-platform polling cycles.
    pub chat_poll_interval_secs: u64,
    /// Seconds between email polling cycles (email sources tolerate longer
    /// intervals than chat).
    pub email_poll_interval_secs: u64,
    /// Seconds between location polling cycles.
    pub location_poll_interval_secs: u64,
    /// Seconds between schedule-trigger ticks.
    pub schedule_tick_secs: u64,
    /// Maximum candidate events fetched per source per cycle.
    pub fetch_batch_limit: u32,
    /// Hours a dedup claim is retained before eviction.
    pub dedup_ttl_hours: u64,
    /// Default page size for execution history queries.
    pub history_default_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chat_poll_interval_secs: 10,
            email_poll_interval_secs: 60,
            location_poll_interval_secs: 30,
            schedule_tick_secs: 5,
            fetch_batch_limit: 50,
            dedup_ttl_hours: 72,
            history_default_limit: 50,
        }
    }
}
