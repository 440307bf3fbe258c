use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Vitalyze";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default generation endpoint (model id and `:generateContent` are appended).
pub const DEFAULT_GENERATION_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.ocr.space/parse/image";
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

const ENV_API_KEY: &str = "VITALYZE_API_KEY";
const ENV_GENERATION_ENDPOINT: &str = "VITALYZE_GENERATION_ENDPOINT";
const ENV_MODEL: &str = "VITALYZE_MODEL";
const ENV_TEMPERATURE: &str = "VITALYZE_TEMPERATURE";
const ENV_MAX_OUTPUT_TOKENS: &str = "VITALYZE_MAX_OUTPUT_TOKENS";
const ENV_TIMEOUT_SECS: &str = "VITALYZE_TIMEOUT_SECS";
const ENV_OCR_API_KEY: &str = "VITALYZE_OCR_API_KEY";
const ENV_OCR_ENDPOINT: &str = "VITALYZE_OCR_ENDPOINT";
const ENV_OCR_LANGUAGE: &str = "VITALYZE_OCR_LANGUAGE";
const ENV_DUMP_DIR: &str = "VITALYZE_DUMP_DIR";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("Demo content error: {0}")]
    DemoContent(String),
}

/// Tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "vitalyze=info"
}

/// Diagnostic dump directory from `VITALYZE_DUMP_DIR`, if set.
pub fn dump_dir() -> Option<PathBuf> {
    std::env::var(ENV_DUMP_DIR)
        .ok()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
}

/// Settings for the remote text-generation endpoint.
#[derive(Clone)]
pub struct GenerationSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// `None` leaves the HTTP client without a timeout.
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for GenerationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GenerationSettings {
    /// Settings with defaults for everything but the credential.
    pub fn new(api_key: &str) -> Self {
        Self {
            endpoint: DEFAULT_GENERATION_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout_secs: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_empty(&lookup, ENV_API_KEY).ok_or(ConfigError::Missing(ENV_API_KEY))?;
        let mut settings = Self::new(&api_key);

        if let Some(endpoint) = non_empty(&lookup, ENV_GENERATION_ENDPOINT) {
            settings.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(model) = non_empty(&lookup, ENV_MODEL) {
            settings.model = model;
        }
        if let Some(temperature) = parse_var::<f32, _>(&lookup, ENV_TEMPERATURE)? {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::Invalid {
                    var: ENV_TEMPERATURE,
                    value: temperature.to_string(),
                });
            }
            settings.temperature = temperature;
        }
        if let Some(max_tokens) = parse_var::<u32, _>(&lookup, ENV_MAX_OUTPUT_TOKENS)? {
            settings.max_output_tokens = max_tokens;
        }
        settings.timeout_secs = parse_var::<u64, _>(&lookup, ENV_TIMEOUT_SECS)?;

        Ok(settings)
    }
}

/// Settings for the OCR endpoint.
#[derive(Clone)]
pub struct OcrSettings {
    pub endpoint: String,
    pub api_key: String,
    pub language: String,
}

impl std::fmt::Debug for OcrSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("language", &self.language)
            .finish()
    }
}

impl OcrSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key =
            non_empty(&lookup, ENV_OCR_API_KEY).ok_or(ConfigError::Missing(ENV_OCR_API_KEY))?;
        Ok(Self {
            endpoint: non_empty(&lookup, ENV_OCR_ENDPOINT)
                .unwrap_or_else(|| DEFAULT_OCR_ENDPOINT.to_string()),
            api_key,
            language: non_empty(&lookup, ENV_OCR_LANGUAGE)
                .unwrap_or_else(|| DEFAULT_OCR_LANGUAGE.to_string()),
        })
    }
}

fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, var) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
