pub mod types;
pub mod prompt;
pub mod gemini_types;
pub mod gemini;
pub mod extract;
pub mod repair;
pub mod coerce;
pub mod normalize;
pub mod fallback;
pub mod orchestrator;
pub mod diagnostic;
pub mod ocr;


pub use types::*;
pub use prompt::*;
pub use gemini::*;
pub use extract::*;
pub use repair::*;
pub use normalize::*;
pub use fallback::*;
pub use orchestrator::*;
pub use ocr::*;

use thiserror::Error;

use crate::config::ConfigError;

/// Substrings (lowercase) that mark a quota or rate-limit rejection.
const QUOTA_MARKERS: &[&str] = &["quota", "rate limit", "rate-limit", "resource_exhausted"];

/// Failure talking to the generation or OCR endpoint. Always surfaced to the caller.
#[derive(Error, Debug)]
pub enum RemoteCallError {
    #[error("Endpoint is not reachable at {0}")]
    Connection(String),

    #[error("Endpoint returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Response missing completion content: {0}")]
    MissingCompletion(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Client configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RemoteCallError {
    /// HTTP status, when the endpoint answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 429 responses or bodies that mention quota or rate limiting.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            Self::Status { status, body } => {
                if *status == 429 {
                    return true;
                }
                let lower = body.to_lowercase();
                QUOTA_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }
}

/// Completion text could not be turned into JSON. Recovered by the fallback policy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("No JSON object or array found in completion text")]
    NoJson,

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Lenient repair could not produce valid JSON: {0}")]
    RepairExhausted(String),
}
