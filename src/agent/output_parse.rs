//! Reduce free-form provider text to a JSON object

use crate::agent::ReasoningError;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});

/// Extract the JSON object a provider reply carries.
///
/// A fenced ```json block wins. Otherwise the whole reply is tried, then
/// the last top-level `{...}` object embedded in surrounding prose.
pub fn extract_json_object(text: &str) -> Result<Value, ReasoningError> {
    if text.trim().is_empty() {
        return Err(ReasoningError::MalformedOutput("empty reply".to_string()));
    }

    for caps in FENCE_RE.captures_iter(text) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(caps[1].trim()) {
            return Ok(value);
        }
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(value);
    }

    last_embedded_object(text).ok_or_else(|| {
        ReasoningError::MalformedOutput(format!(
            "no JSON object found in {} characters of output",
            text.chars().count()
        ))
    })
}

fn last_embedded_object(text: &str) -> Option<Value> {
    let mut found = None;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value @ Value::Object(_))) => {
                found = Some(value);
                pos = start + stream.byte_offset();
            }
            _ => pos = start + 1,
        }
    }

    found
}
