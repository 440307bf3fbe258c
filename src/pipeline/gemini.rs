use std::collections::VecDeque;
use std::sync::Mutex;

use super::gemini_types::{generate_url, GenerateContentRequest, GenerateContentResponse};
use super::types::{LlmClient, PromptRequest};
use super::RemoteCallError;
use crate::config::GenerationSettings;

/// HTTP client for the remote `generateContent` endpoint.
///
/// One request per call. No retries; the caller owns retry policy.
pub struct GeminiClient {
    url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(settings: &GenerationSettings) -> Result<Self, RemoteCallError> {
        let mut builder = reqwest::blocking::Client::builder();
        builder = match settings.timeout_secs {
            Some(secs) => builder.timeout(std::time::Duration::from_secs(secs)),
            None => builder.timeout(None),
        };
        let client = builder
            .build()
            .map_err(|e| RemoteCallError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: generate_url(&settings.endpoint, &settings.model),
            api_key: settings.api_key.clone(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            client,
        })
    }

    /// Build from `VITALYZE_*` environment variables.
    pub fn from_env() -> Result<Self, RemoteCallError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, RemoteCallError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = GenerationSettings::from_lookup(lookup)?;
        Self::new(&settings)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl LlmClient for GeminiClient {
    fn generate(&self, request: &PromptRequest) -> Result<String, RemoteCallError> {
        let body =
            GenerateContentRequest::from_prompt(request, self.temperature, self.max_output_tokens);

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    RemoteCallError::Connection(self.url.clone())
                } else {
                    // Strip the URL: it carries the credential in its query string.
                    RemoteCallError::HttpClient(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Generation endpoint returned error");
            return Err(RemoteCallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| RemoteCallError::ResponseParsing(e.without_url().to_string()))?;

        let text = parsed.completion_text()?;
        tracing::debug!(completion_len = text.len(), "Generation completed");
        Ok(text)
    }
}

/// Mock LLM client for testing. Replays queued responses in order.
///
/// When only one response remains it is returned for every further call.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, MockFailure>>>,
    prompts: Mutex<Vec<PromptRequest>>,
}

/// Failure a mock replays, as (status, body).
#[derive(Debug, Clone)]
pub struct MockFailure {
    pub status: u16,
    pub body: String,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Ok(response.to_string())])),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every call fails with the given HTTP status.
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(MockFailure {
                status,
                body: body.to_string(),
            })])),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, response: &str) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response.to_string()));
        }
        self
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<PromptRequest> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, request: &PromptRequest) -> Result<String, RemoteCallError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.clone());
        }
        let mut queue = self
            .responses
            .lock()
            .map_err(|_| RemoteCallError::HttpClient("mock state poisoned".into()))?;
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(failure)) => Err(RemoteCallError::Status {
                status: failure.status,
                body: failure.body,
            }),
            None => Err(RemoteCallError::MissingCompletion("mock has no responses".into())),
        }
    }
}
