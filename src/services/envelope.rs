//! Decoding of webhook responses.
//!
//! The workflow behind the webhook answers in a few shapes: plain JSON, or an
//! array `[{"output": "<json string>"}]` whose string may be wrapped in a
//! markdown code fence. Job searches may also come back with `jobs`/`summary`
//! instead of `results`/`answer`.

use serde_json::{Map, Value};

use crate::error::RelayError;

const FENCE: &str = "```";

/// Alternate key -> canonical key. The first entry decides whether a payload
/// uses the alternate vocabulary at all.
const VOCABULARY: [(&str, &str); 3] = [
    ("jobs", "results"),
    ("summary", "answer"),
    ("message", "answer"),
];
const PASSTHROUGH: [&str; 1] = ["found_jobs"];

/// Parses a raw response body. An empty body and malformed JSON are
/// different errors.
pub fn decode_body(text: &str) -> Result<Value, RelayError> {
    if text.trim().is_empty() {
        return Err(RelayError::EmptyBody);
    }
    Ok(serde_json::from_str(text)?)
}

/// Full normalization applied to every decoded webhook payload.
pub fn normalize(value: Value) -> Value {
    normalize_fields(unwrap_envelope(value))
}

/// Unwraps `[{"output": "..."}]`. Anything that does not decode cleanly is
/// returned unchanged.
pub fn unwrap_envelope(value: Value) -> Value {
    let output = value
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("output"))
        .and_then(Value::as_str)
        .filter(|output| !output.trim().is_empty());
    let Some(inner) = output else {
        return value;
    };

    match serde_json::from_str::<Value>(strip_code_fence(inner)) {
        Ok(parsed) => {
            log::info!("Unwrapped nested JSON from output field");
            parsed
        }
        Err(e) => {
            log::error!("Could not parse nested output: {}", e);
            value
        }
    }
}

/// Strips a leading fence (with or without a language tag) and a trailing
/// fence.
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        let tag_len = rest
            .find(char::is_whitespace)
            .filter(|&end| rest[..end].chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(0);
        body = &rest[tag_len..];
    }

    if let Some(rest) = body.trim_end().strip_suffix(FENCE) {
        body = rest;
    }

    body.trim()
}

/// Maps the alternate vocabulary onto the canonical one. Objects without the
/// trigger key are returned as is.
pub fn normalize_fields(value: Value) -> Value {
    let Value::Object(mut fields) = value else {
        return value;
    };
    let (trigger, _) = VOCABULARY[0];
    if !fields.contains_key(trigger) {
        return Value::Object(fields);
    }

    let mut normalized = Map::new();
    for (alternate, canonical) in VOCABULARY {
        if normalized.contains_key(canonical) {
            continue;
        }
        if let Some(v) = fields.remove(alternate).filter(|v| !is_blank(v)) {
            normalized.insert(canonical.to_string(), v);
        }
    }
    normalized
        .entry("answer")
        .or_insert_with(|| Value::String(String::new()));

    for key in PASSTHROUGH {
        if let Some(v) = fields.remove(key) {
            normalized.insert(key.to_string(), v);
        }
    }

    log::info!("Normalized webhook payload to results/answer");
    Value::Object(normalized)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
