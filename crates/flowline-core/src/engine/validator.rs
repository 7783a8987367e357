//! Structural workflow validation.
//!
//! Runs before save and before execution. Returns an accumulated, ordered
//! issue list -- triggers first, then actions by position -- so validating
//! the same workflow twice yields an identical list.

use std::collections::HashSet;

use flowline_types::validation::ValidationIssue;
use flowline_types::workflow::{
    Action, ActionConfig, GeofenceTransition, TriggerConfig, Workflow, WorkflowKind,
};

use super::context::{placeholders, seedable_fields};
use super::schedule::parse_schedule;

/// Validate a workflow's structure.
///
/// Errors block save and execution; warnings are advisory. Checks:
/// - at least one trigger and one action
/// - trigger configs are well-formed (parseable schedule, positive geofence
///   radius, dwell threshold present for dwell transitions, non-empty
///   filter strings)
/// - a fully unfiltered platform-message trigger is flagged as a warning
///   (it matches every message of that platform, by design)
/// - every `{{placeholder}}` resolves to a seedable trigger field or the
///   output of a strictly earlier action (forward references are errors)
/// - duplicate output-variable names are warnings
/// - personal workflows never target another user
pub fn validate(workflow: &Workflow) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if workflow.triggers.is_empty() {
        issues.push(ValidationIssue::error(
            "triggers",
            "workflow must have at least one trigger",
        ));
    }
    if workflow.actions.is_empty() {
        issues.push(ValidationIssue::error(
            "actions",
            "workflow must have at least one action",
        ));
    }

    // Variables guaranteed before the first action: the union of seedable
    // fields across every trigger.
    let mut available: HashSet<String> = HashSet::new();
    for (idx, trigger) in workflow.triggers.iter().enumerate() {
        let location = format!("triggers[{idx}]");
        check_trigger(&trigger.config, &location, &mut issues);
        for field in seedable_fields(&trigger.config) {
            available.insert(field.to_string());
        }
    }

    let mut declared_outputs: HashSet<String> = HashSet::new();
    for (idx, action) in workflow.actions.iter().enumerate() {
        let location = format!("actions[{idx}]");
        check_action(
            workflow,
            action,
            &location,
            &mut available,
            &mut declared_outputs,
            &mut issues,
        );
    }

    issues
}

// ---------------------------------------------------------------------------
// Trigger checks
// ---------------------------------------------------------------------------

fn check_trigger(config: &TriggerConfig, location: &str, issues: &mut Vec<ValidationIssue>) {
    match config {
        TriggerConfig::Schedule { expression } => {
            if let Err(e) = parse_schedule(expression) {
                issues.push(ValidationIssue::error(
                    location,
                    format!("invalid schedule '{expression}': {e}"),
                ));
            }
        }
        TriggerConfig::Geofence {
            radius_m,
            transition,
            dwell_secs,
            ..
        } => {
            if *radius_m <= 0.0 {
                issues.push(ValidationIssue::error(
                    location,
                    "geofence radius must be positive",
                ));
            }
            match transition {
                GeofenceTransition::Dwell => {
                    if dwell_secs.map_or(true, |s| s == 0) {
                        issues.push(ValidationIssue::error(
                            location,
                            "dwell transition requires a positive dwell duration",
                        ));
                    }
                }
                _ => {
                    if dwell_secs.is_some() {
                        issues.push(ValidationIssue::warning(
                            location,
                            "dwell duration is ignored for enter/exit transitions",
                        ));
                    }
                }
            }
        }
        TriggerConfig::PlatformMessage {
            platform,
            sender_filter,
            keyword_filter,
            command_prefix,
        } => {
            for (name, filter) in [
                ("sender filter", sender_filter),
                ("keyword filter", keyword_filter),
                ("command prefix", command_prefix),
            ] {
                if filter.as_deref() == Some("") {
                    issues.push(ValidationIssue::error(
                        location,
                        format!("{name} must not be an empty string"),
                    ));
                }
            }
            if sender_filter.is_none() && keyword_filter.is_none() && command_prefix.is_none() {
                issues.push(ValidationIssue::warning(
                    location,
                    format!("no filters set: trigger matches every {platform} message"),
                ));
            }
        }
        TriggerConfig::Manual {} => {}
    }
}

// ---------------------------------------------------------------------------
// Action checks
// ---------------------------------------------------------------------------

fn check_action(
    workflow: &Workflow,
    action: &Action,
    location: &str,
    available: &mut HashSet<String>,
    declared_outputs: &mut HashSet<String>,
    issues: &mut Vec<ValidationIssue>,
) {
    // Cross-user targeting is invalid in personal workflows.
    if workflow.kind == WorkflowKind::Personal {
        if let ActionConfig::SendMessage {
            target_user_id: Some(target),
            ..
        } = &action.config
        {
            if *target != workflow.owner_id {
                issues.push(ValidationIssue::error(
                    location,
                    "personal workflow must not target another user",
                ));
            }
        }
    }

    // Template references must be seedable or produced strictly earlier.
    for (field, template) in action_templates(&action.config) {
        for name in placeholders(template) {
            if !available.contains(&name) {
                issues.push(ValidationIssue::error(
                    location,
                    format!(
                        "{field} references '{{{{{name}}}}}', which is neither a trigger \
                         field nor the output of an earlier action"
                    ),
                ));
            }
        }
    }

    match &action.config {
        ActionConfig::Delay { duration_secs } => {
            if *duration_secs == 0 {
                issues.push(ValidationIssue::warning(
                    location,
                    "delay of 0 seconds has no effect",
                ));
            }
        }
        ActionConfig::Conditional {
            condition,
            then_action,
            else_action,
        } => {
            if condition.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    location,
                    "conditional action requires a condition expression",
                ));
            }
            // Branch sub-actions run at this position: they see the same
            // available set, and their outputs join it afterwards.
            check_action(
                workflow,
                then_action,
                &format!("{location}.then"),
                available,
                declared_outputs,
                issues,
            );
            if let Some(else_action) = else_action {
                check_action(
                    workflow,
                    else_action,
                    &format!("{location}.else"),
                    available,
                    declared_outputs,
                    issues,
                );
            }
        }
        _ => {}
    }

    // Register this action's output variable for later actions; a repeat
    // is last-write-wins at runtime, so only warn.
    if let Some(output) = action.config.output_var() {
        if !declared_outputs.insert(output.to_string()) {
            issues.push(ValidationIssue::warning(
                location,
                format!("output variable '{output}' is also produced by an earlier action"),
            ));
        }
        available.insert(output.to_string());
    }
}

/// The templated string fields of an action, labeled for issue messages.
fn action_templates(config: &ActionConfig) -> Vec<(&'static str, &String)> {
    match config {
        ActionConfig::SendMessage { target, text, .. } => {
            vec![("target", target), ("text", text)]
        }
        ActionConfig::Reply { text, .. } => vec![("text", text)],
        ActionConfig::AiTransform { input, params, .. } => {
            let mut fields = vec![("input", input)];
            fields.extend(params.values().map(|v| ("parameter", v)));
            fields
        }
        ActionConfig::Delay { .. } | ActionConfig::Conditional { .. } => vec![],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
