//! Per-execution variable context with template resolution.
//!
//! `VariableContext` is the mutable state threaded through one action chain:
//! a map from variable name to string value, seeded from the trigger payload
//! via a source-specific field mapping and extended by each action's declared
//! output variable (last write wins). Contexts are never shared across
//! concurrent executions.

use std::collections::HashMap;

use flowline_types::event::{RawEvent, TriggerPayload};
use flowline_types::workflow::{MessagePlatform, TriggerConfig};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Seedable field tables
// ---------------------------------------------------------------------------

/// Variable names an execution is guaranteed to have before the first
/// action runs, given the trigger kind.
///
/// Shared between seeding (below) and the validator's forward-reference
/// check, so the two can never drift apart.
pub fn seedable_fields(config: &TriggerConfig) -> Vec<&'static str> {
    match config {
        TriggerConfig::PlatformMessage { platform, .. } => {
            let mut fields = vec![
                "trigger_content",
                "message_text",
                "message_sender",
                "chat_id",
                "platform",
            ];
            fields.extend(platform_fields(*platform));
            fields
        }
        TriggerConfig::Schedule { .. } => {
            vec!["trigger_content", "trigger_time", "schedule_expression"]
        }
        TriggerConfig::Manual {} => vec!["trigger_content"],
        TriggerConfig::Geofence { .. } => vec![
            "trigger_content",
            "geofence_event",
            "location_latitude",
            "location_longitude",
            "dwell_seconds",
        ],
    }
}

fn platform_fields(platform: MessagePlatform) -> &'static [&'static str] {
    match platform {
        MessagePlatform::Telegram => &["telegram_text", "telegram_user"],
        MessagePlatform::WhatsApp => &["whatsapp_text", "whatsapp_user"],
        MessagePlatform::Email => &["email_subject", "email_from", "email_body"],
    }
}

// ---------------------------------------------------------------------------
// VariableContext
// ---------------------------------------------------------------------------

/// The per-execution mapping of names to string values.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    vars: HashMap<String, String>,
}

impl VariableContext {
    /// Create a context seeded from a trigger payload.
    pub fn seeded_from(payload: &TriggerPayload) -> Self {
        let mut ctx = Self::default();
        match payload {
            TriggerPayload::Message { event } => ctx.seed_message(event),
            TriggerPayload::Geofence { event } => ctx.seed_geofence(event),
            TriggerPayload::Schedule {
                expression,
                fired_at,
            } => {
                let fired = fired_at.to_rfc3339();
                ctx.set("trigger_content", fired.clone());
                ctx.set("trigger_time", fired);
                ctx.set("schedule_expression", expression.clone());
            }
            TriggerPayload::Manual { variables } => {
                for (name, value) in variables {
                    ctx.set(name.clone(), value.clone());
                }
                if !ctx.vars.contains_key("trigger_content") {
                    ctx.set("trigger_content", String::new());
                }
            }
        }
        ctx
    }

    fn seed_message(&mut self, event: &RawEvent) {
        let text = event.text.clone().unwrap_or_default();
        let sender = event.sender.clone().unwrap_or_default();

        self.set("message_text", text.clone());
        self.set("message_sender", sender.clone());
        self.set("chat_id", event.thread_id.clone().unwrap_or_default());
        if let Some(platform) = event.platform {
            self.set("platform", platform.to_string());
        }

        match event.platform {
            Some(MessagePlatform::Telegram) => {
                self.set("telegram_text", text.clone());
                self.set("telegram_user", sender);
                self.set("trigger_content", text);
            }
            Some(MessagePlatform::WhatsApp) => {
                self.set("whatsapp_text", text.clone());
                self.set("whatsapp_user", sender);
                self.set("trigger_content", text);
            }
            Some(MessagePlatform::Email) => {
                let subject = event.subject.clone().unwrap_or_default();
                self.set("email_subject", subject.clone());
                self.set("email_from", sender);
                self.set("email_body", text.clone());
                // Body when present, subject otherwise.
                let content = if text.is_empty() { subject } else { text };
                self.set("trigger_content", content);
            }
            None => {
                self.set("trigger_content", text);
            }
        }
    }

    fn seed_geofence(&mut self, event: &RawEvent) {
        let transition = event
            .transition
            .map(|t| {
                serde_json::to_value(t)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default()
            })
            .unwrap_or_default();
        self.set("geofence_event", transition.clone());
        self.set("trigger_content", transition);
        self.set(
            "dwell_seconds",
            event.dwell_secs.map(|s| s.to_string()).unwrap_or_default(),
        );
        self.set("location_latitude", extra_number(event, "latitude"));
        self.set("location_longitude", extra_number(event, "longitude"));
    }

    /// Set a variable (last write wins).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Number of variables in the context.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the context is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Resolve every `{{variable}}` placeholder in a template.
    ///
    /// An unresolved placeholder is replaced with the empty string and
    /// recorded as a warning -- never a hard failure.
    pub fn resolve(&self, template: &str) -> (String, Vec<String>) {
        let mut out = String::with_capacity(template.len());
        let mut warnings = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            match after_open.find("}}") {
                Some(end) => {
                    let name = after_open[..end].trim();
                    match self.vars.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            warnings.push(format!("unresolved placeholder '{name}'"));
                        }
                    }
                    rest = &after_open[end + 2..];
                }
                None => {
                    // Unterminated marker: keep the literal text.
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        (out, warnings)
    }

    /// Build a JSON object for conditional-expression evaluation.
    ///
    /// Shape: `{ "vars": { "<name>": "<value>", ... } }`.
    pub fn to_expression_context(&self) -> Value {
        json!({ "vars": self.vars })
    }
}

/// Extract the placeholder names referenced by a template, in order of
/// appearance. Used by the validator.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let name = after_open[..end].trim();
                if !name.is_empty() {
                    names.push(name.to_string());
                }
                rest = &after_open[end + 2..];
            }
            None => break,
        }
    }
    names
}

fn extra_number(event: &RawEvent, field: &str) -> String {
    match event.extra.get(field) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
