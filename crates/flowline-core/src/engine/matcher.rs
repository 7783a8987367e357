//! Pure trigger predicate evaluation.
//!
//! `matches(trigger, event) -> bool` with no I/O. Schedule and manual
//! triggers are matched externally (the ticker fires them; manual runs are
//! invoked directly) and are trivially true here.

use flowline_types::event::{RawEvent, SourceKind};
use flowline_types::workflow::{GeofenceTransition, TriggerConfig};

/// Does a fetched raw event satisfy a trigger's declared condition?
///
/// Absent filters match all events of the source type -- intentional
/// permissiveness, surfaced by the validator as a warning.
pub fn matches(config: &TriggerConfig, event: &RawEvent) -> bool {
    match config {
        TriggerConfig::PlatformMessage {
            platform,
            sender_filter,
            keyword_filter,
            command_prefix,
        } => {
            if !matches!(event.source, SourceKind::ChatMessage | SourceKind::EmailMessage) {
                return false;
            }
            if event.platform != Some(*platform) {
                return false;
            }
            sender_matches(sender_filter.as_deref(), event.sender.as_deref())
                && keyword_matches(keyword_filter.as_deref(), event)
                && prefix_matches(command_prefix.as_deref(), event.text.as_deref())
        }
        TriggerConfig::Geofence {
            transition,
            dwell_secs,
            ..
        } => {
            if event.source != SourceKind::Location {
                return false;
            }
            if event.transition != Some(*transition) {
                return false;
            }
            // Dwell additionally requires the elapsed dwell time to have
            // reached the configured threshold.
            if *transition == GeofenceTransition::Dwell {
                let threshold = dwell_secs.unwrap_or(0);
                return event.dwell_secs.unwrap_or(0) >= threshold;
            }
            true
        }
        // Fired by the schedule ticker / direct invocation.
        TriggerConfig::Schedule { .. } | TriggerConfig::Manual {} => true,
    }
}

/// Sender filter: equality or containment against the event sender identity.
fn sender_matches(filter: Option<&str>, sender: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(wanted) => match sender {
            Some(actual) => actual == wanted || actual.contains(wanted),
            None => false,
        },
    }
}

/// Keyword filter: case-insensitive substring match against the message text.
fn keyword_matches(filter: Option<&str>, event: &RawEvent) -> bool {
    match filter {
        None => true,
        Some(keyword) => {
            let keyword = keyword.to_lowercase();
            let in_text = event
                .text
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&keyword));
            let in_subject = event
                .subject
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(&keyword));
            in_text || in_subject
        }
    }
}

/// Command prefix: the message text must start with the declared prefix.
fn prefix_matches(prefix: Option<&str>, text: Option<&str>) -> bool {
    match prefix {
        None => true,
        Some(p) => text.is_some_and(|t| t.starts_with(p)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
