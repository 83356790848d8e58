//! JSON candidate recovery from arbitrary response text.
//!
//! Candidates come from two places: the body itself when it is already a JSON
//! value, and every outermost balanced `{...}` span found by a string-aware
//! scan. Spans go through a [`JsonRepair`] strategy; anything that still fails
//! is dropped.

use serde_json::Value;
use tracing::debug;

use super::repair::{HeuristicRepair, JsonRepair};

/// End of the balanced span opened at `start`, or `None` if the text runs out
/// first. Braces inside `"`, `'` or `` ` `` strings don't count.
fn span_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Outermost `{...}` spans of `text`, left to right.
///
/// A `{` whose span never closes (a brace inside a script string, say) is
/// skipped and scanning resumes right after it. Only when no complete span
/// follows it is the unterminated tail returned, as the last span, so a
/// repair strategy can close it.
pub fn scan_candidates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut open_tail: Option<usize> = None;
    let mut from = 0usize;

    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        match span_end(bytes, start) {
            Some(end) => {
                spans.push(&text[start..=end]);
                open_tail = None;
                from = end + 1;
            }
            None => {
                open_tail.get_or_insert(start);
                from = start + 1;
            }
        }
    }

    if let Some(start) = open_tail {
        spans.push(&text[start..]);
    }
    spans
}

/// Null, empty strings and empty containers carry nothing worth keeping.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// All usable JSON values in `text`, in discovery order.
///
/// `whole` is the body's own parsed value when it has one; it goes first, and
/// a scanned span that is textually the same body is not repaired again.
pub fn recover(text: &str, whole: Option<Value>, repair: &dyn JsonRepair) -> Vec<Value> {
    let mut candidates = Vec::new();
    let mut whole_forms: Vec<String> = Vec::new();

    if let Some(value) = whole {
        whole_forms.push(text.trim().to_string());
        if let Ok(serialised) = serde_json::to_string(&value) {
            whole_forms.push(serialised);
        }
        if !is_empty_value(&value) {
            candidates.push(value);
        }
    }

    for span in scan_candidates(text) {
        if whole_forms.iter().any(|form| form == span) {
            continue;
        }
        match repair.repair(span) {
            Some(value) if !is_empty_value(&value) => candidates.push(value),
            Some(_) => {}
            None => debug!(
                "json recovery: {} could not repair a {}-byte candidate",
                repair.name(),
                span.len()
            ),
        }
    }
    candidates
}

/// Candidates recovered from plain text with the default repair strategy.
pub fn extract_json_candidates(text: &str) -> Vec<Value> {
    recover(text, None, &HeuristicRepair)
}
