//! Lenient parsing of generator output into a visit sequence.
//!
//! The model is asked for a JSON array of POI names but routinely answers with
//! fenced code blocks, prose around the array, or unquoted `[A,B,C]` lists.
//! Parsing never fails: text that yields nothing usable becomes an empty
//! trajectory.

use serde_json::Value;

use crate::trajectory::{CanonicalTrajectory, RawTrajectory};

const FENCE: &str = "```";
const FENCE_TAG: &str = "json";

/// Parses a raw trajectory into ordered POI names.
pub fn parse(raw: &RawTrajectory) -> CanonicalTrajectory {
    let visits = match raw.as_value() {
        Value::String(text) => parse_text(text),
        Value::Array(items) => render_items(items),
        other => {
            tracing::debug!(kind = value_kind(other), "raw trajectory is neither text nor a list");
            Vec::new()
        }
    };
    tracing::debug!(visits = visits.len(), "parsed trajectory");
    visits
}

/// Parses model text: JSON array first, then an unquoted bracket list.
pub fn parse_text(text: &str) -> CanonicalTrajectory {
    let text = strip_code_fence(text);

    if let Some(items) = decode_json_array(text) {
        return items;
    }

    let span = bracket_span(text);
    if let Some(span) = span {
        if span.len() != text.len() {
            if let Some(items) = decode_json_array(span) {
                tracing::debug!("decoded JSON array embedded in prose");
                return items;
            }
        }
    }

    tracing::debug!("JSON decoding failed, falling back to bracket list");
    parse_bracket_list(span.unwrap_or(text))
}

/// Removes a leading ```` ```json ```` (or bare ```` ``` ````) line and a
/// trailing ```` ``` ````, then trims.
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix(FENCE) {
        text = rest.strip_prefix(FENCE_TAG).unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

/// Splits `[A, B, C]` (brackets optional) on commas.
pub fn parse_bracket_list(text: &str) -> CanonicalTrajectory {
    let mut inner = text.trim();
    inner = inner.strip_prefix('[').unwrap_or(inner);
    inner = inner.strip_suffix(']').unwrap_or(inner);
    let inner = inner.trim();

    if inner.is_empty() {
        return Vec::new();
    }
    inner.split(',').map(|item| item.trim().to_string()).collect()
}

fn decode_json_array(text: &str) -> Option<CanonicalTrajectory> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Some(render_items(&items)),
        _ => None,
    }
}

fn render_items(items: &[Value]) -> CanonicalTrajectory {
    items
        .iter()
        .map(|item| match item {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        })
        .collect()
}

fn bracket_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
