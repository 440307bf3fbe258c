//! OCR endpoint client: turns an uploaded report (image or PDF) into text.
//!
//! The endpoint takes a multipart form (`apikey`, `language`,
//! `isOverlayRequired`, `file`) and answers with PascalCase JSON whose
//! `ParsedResults[].ParsedText` hold the text of each page.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::RemoteCallError;
use crate::config::OcrSettings;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A report file to recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl OcrUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        let mime_type = mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();
        Self {
            file_name: file_name.to_string(),
            bytes,
            mime_type,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(&file_name, bytes))
    }
}

/// Text recognition seam. Production uses `OcrClient`; tests use `MockOcrEngine`.
pub trait OcrEngine {
    fn recognize(&self, upload: &OcrUpload) -> Result<String, RemoteCallError>;
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OcrResponse {
    #[serde(default)]
    pub parsed_results: Vec<ParsedResult>,
    #[serde(default)]
    pub is_errored_on_processing: bool,
    /// String or list of strings, depending on the failure.
    #[serde(default)]
    pub error_message: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParsedResult {
    #[serde(default)]
    pub parsed_text: Option<String>,
}

impl OcrResponse {
    /// Joined page text, or `OcrProcessing` when the endpoint flagged an error.
    pub fn into_text(self) -> Result<String, RemoteCallError> {
        if self.is_errored_on_processing {
            return Err(RemoteCallError::OcrProcessing(error_message_text(
                &self.error_message,
            )));
        }
        Ok(collect_parsed_text(&self.parsed_results))
    }
}

/// Non-empty page texts, trimmed, separated by a blank line.
pub fn collect_parsed_text(results: &[ParsedResult]) -> String {
    results
        .iter()
        .filter_map(|r| r.parsed_text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn error_message_text(value: &Value) -> String {
    match value {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                "unknown OCR error".to_string()
            } else {
                parts.join("; ")
            }
        }
        _ => "unknown OCR error".to_string(),
    }
}

// ──────────────────────────────────────────────
// OcrClient
// ──────────────────────────────────────────────

pub struct OcrClient {
    endpoint: String,
    api_key: String,
    language: String,
    client: reqwest::blocking::Client,
}

impl OcrClient {
    pub fn new(settings: &OcrSettings) -> Result<Self, RemoteCallError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| RemoteCallError::HttpClient(e.to_string()))?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            language: settings.language.clone(),
            client,
        })
    }

    fn form(&self, upload: &OcrUpload) -> Result<reqwest::blocking::multipart::Form, RemoteCallError> {
        let file = reqwest::blocking::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)
            .map_err(|e| RemoteCallError::HttpClient(e.to_string()))?;
        Ok(reqwest::blocking::multipart::Form::new()
            .text("apikey", self.api_key.clone())
            .text("language", self.language.clone())
            .text("isOverlayRequired", "false")
            .part("file", file))
    }
}

impl OcrEngine for OcrClient {
    fn recognize(&self, upload: &OcrUpload) -> Result<String, RemoteCallError> {
        tracing::debug!(
            file = %upload.file_name,
            size = upload.bytes.len(),
            mime = %upload.mime_type,
            "Submitting report for OCR"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(self.form(upload)?)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    RemoteCallError::Connection(self.endpoint.clone())
                } else {
                    RemoteCallError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "OCR endpoint returned error");
            return Err(RemoteCallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OcrResponse = response
            .json()
            .map_err(|e| RemoteCallError::ResponseParsing(e.to_string()))?;
        parsed.into_text()
    }
}

/// OCR engine returning fixed text, for tests.
pub struct MockOcrEngine {
    outcome: Result<String, String>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _upload: &OcrUpload) -> Result<String, RemoteCallError> {
        self.outcome
            .clone()
            .map_err(RemoteCallError::OcrProcessing)
    }
}
