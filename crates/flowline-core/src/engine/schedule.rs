//! Schedule math for cron-like trigger expressions.
//!
//! Provides:
//! - Human-readable schedule normalization ("every 5 minutes" -> cron)
//! - Next-occurrence computation used by the trigger manager's ticker
//! - Missed-run detection across restarts

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from schedule parsing and occurrence computation.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Invalid cron expression or schedule string.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

// ---------------------------------------------------------------------------
// Human-readable schedule normalization
// ---------------------------------------------------------------------------

/// Normalize a human-readable schedule string to a 6-field cron expression.
///
/// Supported patterns (case-insensitive):
/// - "every N seconds"     -> "*/N * * * * *"
/// - "every N minutes"     -> "0 */N * * * *"
/// - "every N hours"       -> "0 0 */N * * *"
/// - "every minute"        -> "0 * * * * *"
/// - "every hour"          -> "0 0 * * * *"
/// - "every day"           -> "0 0 0 * * *"
/// - "every day at HH:MM"  -> "0 MM HH * * *"
/// - "hourly"              -> "0 0 * * * *"
/// - "daily"               -> "0 0 0 * * *"
///
/// 5-field cron expressions get a "0" seconds field prepended; 6-field
/// expressions pass through unchanged.
pub fn normalize_schedule(input: &str) -> Result<String, ScheduleError> {
    let trimmed = input.trim();

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() == 5 {
        return Ok(format!("0 {trimmed}"));
    }
    if parts.len() == 6 {
        return Ok(trimmed.to_string());
    }

    let lower = trimmed.to_lowercase();

    if lower == "every minute" || lower == "minutely" {
        return Ok("0 * * * * *".to_string());
    }
    if lower == "every hour" || lower == "hourly" {
        return Ok("0 0 * * * *".to_string());
    }
    if lower == "every day" || lower == "daily" {
        return Ok("0 0 0 * * *".to_string());
    }

    if let Some(rest) = lower.strip_prefix("every ") {
        // "every day at HH:MM"
        if let Some(at_part) = rest.strip_prefix("day at ") {
            let time_parts: Vec<&str> = at_part.split(':').collect();
            if time_parts.len() == 2 {
                let hour: u32 = time_parts[0]
                    .trim()
                    .parse()
                    .map_err(|_| ScheduleError::InvalidSchedule(input.to_string()))?;
                let minute: u32 = time_parts[1]
                    .trim()
                    .parse()
                    .map_err(|_| ScheduleError::InvalidSchedule(input.to_string()))?;
                if hour < 24 && minute < 60 {
                    return Ok(format!("0 {minute} {hour} * * *"));
                }
            }
            return Err(ScheduleError::InvalidSchedule(input.to_string()));
        }

        // "every N seconds/minutes/hours"
        let words: Vec<&str> = rest.split_whitespace().collect();
        if words.len() == 2 {
            let n: u32 = words[0]
                .parse()
                .map_err(|_| ScheduleError::InvalidSchedule(input.to_string()))?;
            if n == 0 {
                return Err(ScheduleError::InvalidSchedule(
                    "interval must be > 0".to_string(),
                ));
            }
            let unit = words[1].trim_end_matches('s');
            return match unit {
                "second" => Ok(format!("*/{n} * * * * *")),
                "minute" => Ok(format!("0 */{n} * * * *")),
                "hour" => Ok(format!("0 0 */{n} * * *")),
                _ => Err(ScheduleError::InvalidSchedule(input.to_string())),
            };
        }
    }

    Err(ScheduleError::InvalidSchedule(format!(
        "unrecognized schedule format: '{trimmed}'"
    )))
}

// ---------------------------------------------------------------------------
// Occurrence computation
// ---------------------------------------------------------------------------

/// Parse a schedule (cron or human-readable) into a croner pattern.
pub fn parse_schedule(expression: &str) -> Result<croner::Cron, ScheduleError> {
    let cron_expr = normalize_schedule(expression)?;
    cron_expr
        .parse::<croner::Cron>()
        .map_err(|e| ScheduleError::InvalidSchedule(e.to_string()))
}

/// The first occurrence strictly after `after`.
pub fn next_occurrence_after(
    expression: &str,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let cron = parse_schedule(expression)?;
    Ok(cron.iter_after(after).next())
}

/// Occurrences strictly after `last_fired` and strictly before `now`.
///
/// Used on restart to detect runs the ticker would have dispatched while the
/// process was down. An empty result means the schedule is on track.
pub fn missed_occurrences(
    expression: &str,
    last_fired: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    let cron = parse_schedule(expression)?;
    let mut missed = Vec::new();
    for next in cron.iter_after(last_fired) {
        if next >= now {
            break;
        }
        missed.push(next);
    }
    Ok(missed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
