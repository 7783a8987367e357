//! Action resolution and the action-handler collaborator port.
//!
//! Communication and AI actions are performed by an external collaborator;
//! the engine resolves `{{variable}}` templates into a concrete
//! [`ActionRequest`] first, so handlers never see raw templates. Delay and
//! conditional actions are in-process and never reach a handler.

use std::collections::HashMap;

use flowline_types::error::ActionError;
use flowline_types::workflow::{ActionConfig, AiTransformKind, MessagePlatform};

use super::context::VariableContext;

// ---------------------------------------------------------------------------
// ActionRequest / ActionResponse
// ---------------------------------------------------------------------------

/// A fully resolved unit of external work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    SendMessage {
        platform: MessagePlatform,
        target: String,
        text: String,
    },
    /// Reply into the conversation that triggered the run. Platform and
    /// thread come from the seeded context (`platform`, `chat_id`).
    Reply {
        platform: Option<MessagePlatform>,
        thread_id: Option<String>,
        text: String,
    },
    AiTransform {
        transform: AiTransformKind,
        input: String,
        params: HashMap<String, String>,
    },
}

/// What a handler produced.
#[derive(Debug, Clone, Default)]
pub struct ActionResponse {
    /// Value to merge into the variable context under the action's
    /// declared output variable, if any.
    pub output: Option<String>,
}

// ---------------------------------------------------------------------------
// ActionHandler port
// ---------------------------------------------------------------------------

/// External collaborator that performs communication and AI actions.
///
/// Implementations route on the request variant (message transports, the
/// AI backend). A failed perform is captured per-action in the execution
/// record; whether it halts the run depends on the action's policy flag.
pub trait ActionHandler: Send + Sync {
    fn perform(
        &self,
        request: &ActionRequest,
    ) -> impl std::future::Future<Output = Result<ActionResponse, ActionError>> + Send;
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// An external action with its templates resolved against the context.
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    pub request: ActionRequest,
    /// Template-resolution warnings (unresolved placeholders).
    pub warnings: Vec<String>,
}

/// Resolve an action's templated parameters into a concrete request.
///
/// Returns `None` for in-process actions (delay, conditional), which the
/// executor handles itself.
pub fn resolve_request(config: &ActionConfig, ctx: &VariableContext) -> Option<ResolvedAction> {
    match config {
        ActionConfig::SendMessage {
            platform,
            target,
            text,
            ..
        } => {
            let mut warnings = Vec::new();
            let (target, mut w) = ctx.resolve(target);
            warnings.append(&mut w);
            let (text, mut w) = ctx.resolve(text);
            warnings.append(&mut w);
            Some(ResolvedAction {
                request: ActionRequest::SendMessage {
                    platform: *platform,
                    target,
                    text,
                },
                warnings,
            })
        }
        ActionConfig::Reply { text, .. } => {
            let (text, warnings) = ctx.resolve(text);
            Some(ResolvedAction {
                request: ActionRequest::Reply {
                    platform: ctx.get("platform").and_then(parse_platform),
                    thread_id: ctx
                        .get("chat_id")
                        .filter(|id| !id.is_empty())
                        .map(str::to_string),
                    text,
                },
                warnings,
            })
        }
        ActionConfig::AiTransform {
            transform,
            input,
            params,
            ..
        } => {
            let mut warnings = Vec::new();
            let (input, mut w) = ctx.resolve(input);
            warnings.append(&mut w);
            let params = params
                .iter()
                .map(|(name, template)| {
                    let (value, mut w) = ctx.resolve(template);
                    warnings.append(&mut w);
                    (name.clone(), value)
                })
                .collect();
            Some(ResolvedAction {
                request: ActionRequest::AiTransform {
                    transform: *transform,
                    input,
                    params,
                },
                warnings,
            })
        }
        ActionConfig::Delay { .. } | ActionConfig::Conditional { .. } => None,
    }
}

fn parse_platform(name: &str) -> Option<MessagePlatform> {
    match name {
        "telegram" => Some(MessagePlatform::Telegram),
        "whatsapp" => Some(MessagePlatform::WhatsApp),
        "email" => Some(MessagePlatform::Email),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
