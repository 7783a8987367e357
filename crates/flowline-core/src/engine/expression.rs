//! JEXL expression evaluator for conditional actions.
//!
//! Wraps `jexl_eval::Evaluator` with a standard transform set and provides
//! boolean evaluation against a variable context (exposed to expressions as
//! `vars.<name>`).
//!
//! Context values are always passed as a context object, never interpolated
//! into the expression string.

use serde_json::{Value, json};

use super::context::VariableContext;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from expression evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("invalid context: {0}")]
    InvalidContext(String),
}

// ---------------------------------------------------------------------------
// ConditionEvaluator
// ---------------------------------------------------------------------------

/// Expression evaluator with standard transforms pre-registered.
///
/// Used for conditional-action branching, e.g.
/// `vars.summary|length > 0` or `vars.count|number >= 3`.
pub struct ConditionEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl ConditionEvaluator {
    /// Create a new evaluator with all standard transforms registered.
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            // String transforms
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_uppercase()))
            })
            .with_transform("trim", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.trim()))
            })
            // String search transforms
            .with_transform("contains", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let search = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.contains(search)))
            })
            .with_transform("startsWith", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let prefix = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.starts_with(prefix)))
            })
            .with_transform("endsWith", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let suffix = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.ends_with(suffix)))
            })
            // Length transform (strings, arrays, objects)
            .with_transform("length", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                let len = match &val {
                    Value::String(s) => s.len(),
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            })
            // Boolean negation with JS-like truthiness
            .with_transform("not", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                Ok(json!(!truthy(&val)))
            })
            // Numeric parse for string-typed context variables
            .with_transform("number", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                let n = match &val {
                    Value::Number(n) => n.as_f64().unwrap_or(0.0),
                    Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
                    Value::Bool(true) => 1.0,
                    _ => 0.0,
                };
                Ok(json!(n))
            });

        Self { evaluator }
    }

    /// Evaluate an expression to a boolean result.
    ///
    /// The context must be a JSON object; results are coerced to boolean
    /// using JavaScript-like truthiness rules.
    pub fn evaluate_bool(
        &self,
        expression: &str,
        context: &Value,
    ) -> Result<bool, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }

        let result = self
            .evaluator
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))?;

        Ok(truthy(&result))
    }

    /// Evaluate an expression against a variable context.
    pub fn evaluate_condition(
        &self,
        expression: &str,
        vars: &VariableContext,
    ) -> Result<bool, ExpressionError> {
        self.evaluate_bool(expression, &vars.to_expression_context())
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// JavaScript-like truthiness.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
