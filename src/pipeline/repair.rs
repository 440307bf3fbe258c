//! Lenient repair pass for completions that fail strict extraction.
//!
//! Repairs are bounded and applied in order: strip leftover fence markers,
//! drop trailing commas before a closing bracket, and, only if that still
//! fails, straighten typographic double quotes.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::extract::{candidate_span, extract};
use super::ExtractionError;

static FENCE_MARKERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)```(?:json)?").expect("valid regex"));

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));

/// Parse completion text: strict extraction first, lenient repair second.
pub fn parse_completion(raw: &str) -> Result<Value, ExtractionError> {
    match extract(raw) {
        Ok(value) => Ok(value),
        Err(ExtractionError::NoJson) => Err(ExtractionError::NoJson),
        Err(first) => {
            tracing::debug!(error = %first, "Strict extraction failed, attempting repair");
            repair(raw)
        }
    }
}

/// Apply the bounded repairs to the extracted candidate and re-parse strictly.
pub fn repair(raw: &str) -> Result<Value, ExtractionError> {
    let defenced = FENCE_MARKERS.replace_all(raw, "");
    let candidate = candidate_span(defenced.trim()).ok_or(ExtractionError::NoJson)?;

    let without_commas = remove_trailing_commas(candidate);
    match serde_json::from_str::<Value>(&without_commas) {
        Ok(value) => return Ok(value),
        Err(e) => tracing::debug!(error = %e, "Trailing-comma repair insufficient"),
    }

    let straightened = normalize_quotes(&without_commas);
    serde_json::from_str::<Value>(&straightened)
        .map_err(|e| ExtractionError::RepairExhausted(e.to_string()))
}

/// `,` followed by optional whitespace and `}`/`]` loses the comma.
pub fn remove_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

/// Replace typographic double quotes with ASCII quotes.
pub fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}'], "\"")
}
