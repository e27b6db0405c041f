//! Variable space and `{{ domain.key }}` template rendering.
//!
//! The renderer never fails: malformed or unresolvable references are
//! replaced with a visible marker so that a bad template shows up in the
//! output instead of aborting a run.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};

/// `{{ path }}` where `path` is one or more dot-separated word segments.
pub static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([\w\.]+)\s*\}\}").expect("reference pattern is a valid regex")
});

/// Domain holding caller-supplied and defaulted inputs.
pub const INPUTS: &str = "inputs";

/// Domain holding per-node step results.
pub const STEPS: &str = "steps";

// ---------------------------------------------------------------------------
// VariableSpace
// ---------------------------------------------------------------------------

/// Two-level mapping `domain -> key -> value` that templates resolve against.
///
/// A fresh space always carries the `inputs` and `steps` domains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableSpace {
    domains: BTreeMap<String, Map<String, Value>>,
}

impl VariableSpace {
    /// Create a space seeded with `inputs` and an empty `steps` domain.
    pub fn new(inputs: Map<String, Value>) -> Self {
        let mut domains = BTreeMap::new();
        domains.insert(INPUTS.to_string(), inputs);
        domains.insert(STEPS.to_string(), Map::new());
        Self { domains }
    }

    pub fn get(&self, domain: &str, key: &str) -> Option<&Value> {
        self.domains.get(domain).and_then(|entries| entries.get(key))
    }

    pub fn set(&mut self, domain: &str, key: &str, value: Value) {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Record a node's result under `steps[node_id]`, replacing any earlier value.
    pub fn set_step(&mut self, node_id: &str, value: Value) {
        self.set(STEPS, node_id, value);
    }

    pub fn step(&self, node_id: &str) -> Option<&Value> {
        self.get(STEPS, node_id)
    }

    /// The whole space as a JSON object, one key per domain.
    ///
    /// This is the context LOGIC_GATE rules are evaluated against.
    pub fn to_expression_context(&self) -> Value {
        let mut root = Map::new();
        for (domain, entries) in &self.domains {
            root.insert(domain.clone(), Value::Object(entries.clone()));
        }
        Value::Object(root)
    }
}

impl Default for VariableSpace {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Replace every `{{ domain.key[.field...] }}` in `template`.
///
/// - fewer than two segments: `<! malformed reference: path !>`
/// - unknown domain, key or nested field: `<! reference missing: path !>`
/// - strings are inserted raw, other values as compact JSON
pub fn render(template: &str, vars: &VariableSpace) -> String {
    REFERENCE_PATTERN
        .replace_all(template, |caps: &Captures| {
            let path = &caps[1];
            match resolve(path, vars) {
                Resolution::Found(value) => value_to_string(value),
                Resolution::Malformed => format!("<! malformed reference: {path} !>"),
                Resolution::Missing => format!("<! reference missing: {path} !>"),
            }
        })
        .into_owned()
}

/// Render every string inside a JSON value, leaving other scalars untouched.
pub fn render_value(value: &Value, vars: &VariableSpace) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, vars)).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), render_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

enum Resolution<'a> {
    Found(&'a Value),
    Malformed,
    Missing,
}

fn resolve<'a>(path: &str, vars: &'a VariableSpace) -> Resolution<'a> {
    let mut segments = path.split('.');
    let (Some(domain), Some(key)) = (segments.next(), segments.next()) else {
        return Resolution::Malformed;
    };

    let Some(mut value) = vars.get(domain, key) else {
        return Resolution::Missing;
    };

    for field in segments {
        match value.get(field) {
            Some(next) => value = next,
            None => return Resolution::Missing,
        }
    }

    Resolution::Found(value)
}

/// Convert a JSON value to the text substituted into a template.
///
/// Strings are returned raw (no quotes), null becomes `"null"`, and all
/// other values are rendered as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn space() -> VariableSpace {
        let mut inputs = Map::new();
        inputs.insert("x".to_string(), json!("hello"));
        inputs.insert("count".to_string(), json!(3));
        let mut vars = VariableSpace::new(inputs);
        vars.set_step("n1", json!({"output": {"rows": [1, 2]}, "status": "ok"}));
        vars
    }

    #[test]
    fn test_render_plain_text_unchanged() {
        assert_eq!(render("no references here", &space()), "no references here");
    }

    #[test]
    fn test_render_string_input_raw() {
        assert_eq!(render("say {{ inputs.x }}!", &space()), "say hello!");
    }

    #[test]
    fn test_render_tolerates_missing_whitespace() {
        assert_eq!(render("{{inputs.x}}", &space()), "hello");
    }

    #[test]
    fn test_render_number_as_json() {
        assert_eq!(render("{{ inputs.count }}", &space()), "3");
    }

    #[test]
    fn test_render_object_as_compact_json() {
        assert_eq!(
            render("{{ steps.n1.output }}", &space()),
            r#"{"rows":[1,2]}"#
        );
    }

    #[test]
    fn test_render_nested_field() {
        assert_eq!(render("{{ steps.n1.status }}", &space()), "ok");
    }

    #[test]
    fn test_render_single_segment_is_malformed() {
        assert_eq!(
            render("{{ inputs }}", &space()),
            "<! malformed reference: inputs !>"
        );
    }

    #[test]
    fn test_render_unknown_domain_is_missing() {
        assert_eq!(
            render("{{ secrets.token }}", &space()),
            "<! reference missing: secrets.token !>"
        );
    }

    #[test]
    fn test_render_unknown_key_is_missing() {
        assert_eq!(
            render("a={{ inputs.nope }} b={{ inputs.x }}", &space()),
            "a=<! reference missing: inputs.nope !> b=hello"
        );
    }

    #[test]
    fn test_render_unknown_nested_field_is_missing() {
        assert_eq!(
            render("{{ steps.n1.output.absent }}", &space()),
            "<! reference missing: steps.n1.output.absent !>"
        );
    }

    #[test]
    fn test_render_null_value() {
        let mut vars = VariableSpace::default();
        vars.set(INPUTS, "maybe", Value::Null);
        assert_eq!(render("{{ inputs.maybe }}", &vars), "null");
    }

    #[test]
    fn test_render_value_walks_nested_payload() {
        let payload = json!({"q": "{{ inputs.x }}", "list": ["{{ inputs.count }}", 7], "flag": true});
        let rendered = render_value(&payload, &space());
        assert_eq!(rendered, json!({"q": "hello", "list": ["3", 7], "flag": true}));
    }

    #[test]
    fn test_set_step_replaces_previous_value() {
        let mut vars = space();
        vars.set_step("n1", json!({"error": "boom"}));
        assert_eq!(vars.step("n1"), Some(&json!({"error": "boom"})));
    }

    #[test]
    fn test_expression_context_has_both_domains() {
        let ctx = space().to_expression_context();
        assert_eq!(ctx["inputs"]["x"], json!("hello"));
        assert_eq!(ctx["steps"]["n1"]["status"], json!("ok"));
    }
}
