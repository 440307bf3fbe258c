//! Locate and strictly parse the JSON payload inside a completion.
//!
//! Generation endpoints wrap JSON in prose or Markdown fences even when told
//! not to. Extraction is two-phase: the whole (unfenced) text first, then the
//! span from the first opening bracket to the last matching closing bracket.

use serde_json::Value;

use super::ExtractionError;

const FENCE: &str = "```";

/// Extract the JSON value from completion text.
pub fn extract(raw: &str) -> Result<Value, ExtractionError> {
    let text = strip_code_fence(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let candidate = candidate_span(text).ok_or(ExtractionError::NoJson)?;
    serde_json::from_str::<Value>(candidate).map_err(|e| ExtractionError::JsonParsing(e.to_string()))
}

/// Remove a leading and/or trailing Markdown fence, with an optional `json` tag.
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        body = strip_language_tag(rest);
    }
    if let Some(rest) = body.strip_suffix(FENCE) {
        body = rest;
    }

    body.trim()
}

/// Drop a `json` tag directly after an opening fence.
fn strip_language_tag(after_fence: &str) -> &str {
    let tag_len = "json".len();
    match after_fence.get(..tag_len) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &after_fence[tag_len..],
        _ => after_fence,
    }
}

/// The substring from the first `{` or `[` to the last matching closer.
///
/// Returns `None` when the text has no opening bracket, or no closer after it.
pub fn candidate_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = match text.as_bytes()[start] {
        b'{' => '}',
        _ => ']',
    };
    let end = text.rfind(closer)?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}
