//! Wire types for the `generateContent` text-generation API.
//!
//! Request: `POST {endpoint}/{model}:generateContent?key=…` with the prompt as
//! content parts plus a generation config. Response: an envelope of
//! candidates whose `content.parts[].text` are concatenated into the
//! completion text.

use serde::{Deserialize, Serialize};

use super::types::PromptRequest;
use super::RemoteCallError;

const JSON_MIME_TYPE: &str = "application/json";

// ──────────────────────────────────────────────
// Request
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

impl GenerateContentRequest {
    /// Build the request body. A schema hint also requests a JSON MIME type.
    pub fn from_prompt(prompt: &PromptRequest, temperature: f32, max_output_tokens: u32) -> Self {
        let mut parts = vec![Part::Text {
            text: prompt.text.clone(),
        }];
        parts.extend(prompt.images.iter().map(|image| Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data_base64.clone(),
            },
        }));

        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens,
                response_mime_type: prompt
                    .schema_hint
                    .as_ref()
                    .map(|_| JSON_MIME_TYPE.to_string()),
                response_schema: prompt.schema_hint.clone(),
            },
        }
    }
}

/// `{endpoint}/{model}:generateContent`, tolerant of a trailing slash.
pub fn generate_url(endpoint: &str, model: &str) -> String {
    format!("{}/{}:generateContent", endpoint.trim_end_matches('/'), model)
}

// ──────────────────────────────────────────────
// Response
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenate every text part of the first candidate.
    ///
    /// Fails when candidates or content are absent, or when the prompt was blocked.
    pub fn completion_text(&self) -> Result<String, RemoteCallError> {
        let candidate = match self.candidates.as_deref() {
            Some([first, ..]) => first,
            _ => {
                let detail = match self
                    .prompt_feedback
                    .as_ref()
                    .and_then(|f| f.block_reason.as_deref())
                {
                    Some(reason) => format!("prompt blocked ({reason})"),
                    None => "no candidates".to_string(),
                };
                return Err(RemoteCallError::MissingCompletion(detail));
            }
        };

        let content = candidate.content.as_ref().ok_or_else(|| {
            RemoteCallError::MissingCompletion(format!(
                "candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if texts.is_empty() {
            return Err(RemoteCallError::MissingCompletion(
                "candidate content has no text parts".into(),
            ));
        }
        Ok(texts.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::InlineImage;
    use serde_json::json;

    #[test]
    fn url_joins_endpoint_and_model() {
        assert_eq!(
            generate_url("https://example.test/v1beta/models/", "gemini-1.5-flash"),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn request_serializes_text_and_config() {
        let prompt = PromptRequest::text("hello".into());
        let body = serde_json::to_value(GenerateContentRequest::from_prompt(&prompt, 0.2, 1024))
            .unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert!(body["generationConfig"].get("responseSchema").is_none());
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn schema_hint_requests_json_output() {
        let prompt = PromptRequest::text("x".into()).with_schema(json!({"type": "OBJECT"}));
        let body = serde_json::to_value(GenerateContentRequest::from_prompt(&prompt, 0.0, 10))
            .unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn images_become_inline_data_parts() {
        let prompt = PromptRequest::text("meal".into()).with_image(InlineImage {
            mime_type: "image/png".into(),
            data_base64: "AAAA".into(),
        });
        let body = serde_json::to_value(GenerateContentRequest::from_prompt(&prompt, 0.2, 10))
            .unwrap();
        let part = &body["contents"][0]["parts"][1];
        assert_eq!(part["inline_data"]["mime_type"], "image/png");
        assert_eq!(part["inline_data"]["data"], "AAAA");
    }

    #[test]
    fn completion_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}], "role": "model"},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.completion_text().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn missing_candidates_is_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            response.completion_text(),
            Err(RemoteCallError::MissingCompletion(_))
        ));
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = response.completion_text().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn candidate_without_content_is_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        let err = response.completion_text().unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn content_without_text_parts_is_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": []}}]
        }))
        .unwrap();
        assert!(response.completion_text().is_err());
    }
}
