//! JEXL evaluator for LOGIC_GATE rule conditions.
//!
//! Wraps `jexl_eval::Evaluator` with a small set of string transforms.
//! Rules read the variable space as a context object (`inputs.*`,
//! `steps.*`); values are never interpolated into the expression text.

use serde_json::{Value, json};

use crate::renderer::REFERENCE_PATTERN;

/// Conditions that always match.
const CATCH_ALL: [&str; 4] = ["", "default", "else", "true"];

#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("invalid context: {0}")]
    InvalidContext(String),
}

/// JEXL evaluator with the rule transforms pre-registered.
pub struct RuleEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl RuleEvaluator {
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
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
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.chars().count(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            })
            .with_transform("not", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                Ok(json!(!value_to_bool(&val)))
            });

        Self { evaluator }
    }

    /// Whether `condition` matches unconditionally.
    pub fn is_catch_all(condition: &str) -> bool {
        CATCH_ALL.contains(&condition.trim())
    }

    /// Evaluate a rule condition to a boolean.
    ///
    /// Catch-all conditions short-circuit to `true`. `{{ path }}` wrappers
    /// are unwrapped to plain `path` identifiers so authors may use either
    /// style. Results are coerced with JavaScript-like truthiness.
    pub fn evaluate_rule(&self, condition: &str, context: &Value) -> Result<bool, ExpressionError> {
        if Self::is_catch_all(condition) {
            return Ok(true);
        }
        let expression = REFERENCE_PATTERN.replace_all(condition, "$1");
        self.evaluate_bool(&expression, context)
    }

    pub fn evaluate_bool(&self, expression: &str, context: &Value) -> Result<bool, ExpressionError> {
        let result = self.evaluate_value(expression, context)?;
        Ok(value_to_bool(&result))
    }

    pub fn evaluate_value(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }

        self.evaluator
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))
    }
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// JavaScript-like truthiness.
fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Value {
        json!({
            "inputs": {"region": "EMEA", "amount": 120.0, "tags": ["vip", "eu"]},
            "steps": {"fetch": {"output": {"status": "ok", "rows": 0}}}
        })
    }

    #[test]
    fn test_catch_all_conditions() {
        let eval = RuleEvaluator::new();
        for cond in ["", "default", "else", "true", "  default  "] {
            assert!(eval.evaluate_rule(cond, &ctx()).unwrap(), "{cond:?}");
        }
    }

    #[test]
    fn test_comparison_against_inputs() {
        let eval = RuleEvaluator::new();
        assert!(eval.evaluate_rule("inputs.amount > 100", &ctx()).unwrap());
        assert!(!eval.evaluate_rule("inputs.amount > 500", &ctx()).unwrap());
    }

    #[test]
    fn test_nested_step_output() {
        let eval = RuleEvaluator::new();
        assert!(eval
            .evaluate_rule("steps.fetch.output.status == 'ok'", &ctx())
            .unwrap());
    }

    #[test]
    fn test_template_wrapped_paths_are_unwrapped() {
        let eval = RuleEvaluator::new();
        assert!(eval
            .evaluate_rule("{{ inputs.region }} == 'EMEA'", &ctx())
            .unwrap());
    }

    #[test]
    fn test_transforms() {
        let eval = RuleEvaluator::new();
        assert!(eval.evaluate_rule("inputs.region|lower == 'emea'", &ctx()).unwrap());
        assert!(eval.evaluate_rule("inputs.region|startsWith('EM')", &ctx()).unwrap());
        assert!(eval.evaluate_rule("inputs.tags|length == 2", &ctx()).unwrap());
    }

    #[test]
    fn test_zero_is_falsy() {
        let eval = RuleEvaluator::new();
        assert!(!eval.evaluate_rule("steps.fetch.output.rows", &ctx()).unwrap());
    }

    #[test]
    fn test_non_object_context_rejected() {
        let eval = RuleEvaluator::new();
        let err = eval.evaluate_bool("1 == 1", &json!([1])).unwrap_err();
        assert!(matches!(err, ExpressionError::InvalidContext(_)));
    }

    #[test]
    fn test_syntax_error_reported() {
        let eval = RuleEvaluator::new();
        assert!(eval.evaluate_rule("inputs.amount >", &ctx()).is_err());
    }
}
