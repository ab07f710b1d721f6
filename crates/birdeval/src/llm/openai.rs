use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError};
use crate::utils::redaction::redact_and_truncate;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const MODEL_ENV: &str = "BIRDEVAL_LLM_MODEL";
pub const BASE_URL_ENV: &str = "BIRDEVAL_LLM_BASE_URL";
pub const TIMEOUT_ENV: &str = "BIRDEVAL_LLM_TIMEOUT_SECS";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const ERROR_BODY_MAX_CHARS: usize = 500;

#[derive(Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl LlmSettings {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            api_key: read(API_KEY_ENV),
            model: read(MODEL_ENV).unwrap_or(defaults.model),
            base_url: read(BASE_URL_ENV)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: read(TIMEOUT_ENV)
                .and_then(|secs| secs.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }

    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],

    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    settings: LlmSettings,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(LlmError::MissingApiKey(API_KEY_ENV))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            settings,
            api_key,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }
}

impl LlmClient for OpenAiClient {
    fn complete(&self, prompt: &str, deterministic: bool) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: deterministic.then_some(0.0),
        };

        let response = self
            .http
            .post(self.settings.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|error| {
                LlmError::Transport(redact_and_truncate(&error.to_string(), ERROR_BODY_MAX_CHARS).text)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: redact_and_truncate(&body, ERROR_BODY_MAX_CHARS).text,
            });
        }

        let decoded = response
            .json::<ChatResponse>()
            .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;
        extract_content(decoded)
    }
}

fn extract_content(response: ChatResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| LlmError::MalformedResponse("response has no message content".to_string()))
}
