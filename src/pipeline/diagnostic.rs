//! Per-request diagnostic dump of prompts, completions and results.
//!
//! Disabled unless a base directory is configured (`VITALYZE_DUMP_DIR` or
//! `HealthAnalyzer::with_dump_dir`).
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{request_id}/
//!   01-prompt.txt
//!   02-completion.txt
//!   03-result.json
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const PROMPT_FILE: &str = "01-prompt.txt";
pub const COMPLETION_FILE: &str = "02-completion.txt";
pub const RESULT_FILE: &str = "03-result.json";

/// Returns the dump directory for a request, creating it on first use.
///
/// Returns `None` (with a warning) if directory creation fails.
pub fn dump_dir_for(base: &Path, request_id: &Uuid) -> Option<PathBuf> {
    let dir = base.join(request_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

/// Write a JSON artifact, pretty-printed. Never panics.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    let json = match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to serialize JSON"
            );
            return;
        }
    };
    write_artifact(&path, json.as_bytes());
}

/// Write a text artifact (prompt, raw completion). Never panics.
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    write_artifact(&dir.join(filename), text.as_bytes());
}

fn write_artifact(path: &Path, data: &[u8]) {
    match std::fs::write(path, data) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "Diagnostic dump: artifact written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write artifact"
        ),
    }
}
