//! Dotted field paths into JSON payloads

use serde_json::Value;

/// Split a dotted path (`provider.npi`) into its segments, dropping empty ones.
pub fn parse_dotted(path: &str) -> Vec<String> {
    path.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve a path against a value. Numeric segments index into arrays.
pub fn lookup<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Name of a JSON value's type, as used in validation messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether the word `unverified`, in any case, appears anywhere in the value.
pub fn contains_unverified(value: &Value) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains("unverified"),
        Value::Array(items) => items.iter().any(contains_unverified),
        Value::Object(map) => map.values().any(contains_unverified),
        _ => false,
    }
}
