//! Structured validation results.
//!
//! The validator never throws an opaque error: it returns an accumulated
//! list of issues, each pinned to a location within the workflow, so
//! callers can surface every problem at once.

use serde::{Deserialize, Serialize};

/// How serious a validation issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Advisory only; the workflow may still be saved and executed.
    Warning,
    /// Blocks save and execution.
    Error,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Where in the workflow the issue lies, e.g. `actions[2]` or
    /// `triggers[0]`.
    pub location: String,
    /// Human-readable description.
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// True when no issue in the list blocks save/execution.
pub fn passes(issues: &[ValidationIssue]) -> bool {
    issues.iter().all(|i| i.severity != Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_severity() {
        let err = ValidationIssue::error("actions[0]", "bad");
        assert_eq!(err.severity, Severity::Error);
        let warn = ValidationIssue::warning("actions[1]", "meh");
        assert_eq!(warn.severity, Severity::Warning);
    }

    #[test]
    fn passes_ignores_warnings() {
        let issues = vec![ValidationIssue::warning("triggers[0]", "broad filter")];
        assert!(passes(&issues));

        let issues = vec![
            ValidationIssue::warning("triggers[0]", "broad filter"),
            ValidationIssue::error("actions[0]", "forward reference"),
        ];
        assert!(!passes(&issues));
    }

    #[test]
    fn issue_serde_roundtrip() {
        let issue = ValidationIssue::error("actions[2]", "unknown variable 'y'");
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"severity\":\"error\""));
        let parsed: ValidationIssue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, issue);
    }
}
