//! Placeholder interpolation.
//!
//! Strings may reference the variable store with `{{vars.NAME}}` (or the
//! triple-brace form `{{{vars.NAME}}}`, rendered identically). Nested values
//! are addressed with dotted paths: `{{vars.address.city}}`.
//!
//! Rendering never fails: a missing variable, a `null` value or a placeholder
//! outside the `vars.` namespace renders as the empty string.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::vars::Vars;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{?\s*([A-Za-z0-9_.\-]+)\s*\}?\}\}").expect("placeholder pattern is valid")
});

const VARS_PREFIX: &str = "vars.";

/// Replaces every placeholder in `template` with its current value.
pub fn render_str(template: &str, vars: &Vars) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            caps[1]
                .strip_prefix(VARS_PREFIX)
                .and_then(|path| vars.lookup(path))
                .map(stringify)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Renders every string leaf of a JSON value.
pub fn render_value(value: &Value, vars: &Vars) -> Value {
    match value {
        Value::String(s) => Value::String(render_str(s, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Text form of a variable value as it appears in rendered output.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}
