mod openai;

pub use openai::{LlmSettings, OpenAiClient};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Transport(String),

    #[error("llm endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("llm response was malformed: {0}")]
    MalformedResponse(String),

    #[error("llm api key is not configured; set {0}")]
    MissingApiKey(&'static str),
}

/// Chat completion endpoint used by every pipeline stage.
pub trait LlmClient: Send + Sync {
    fn complete(&self, prompt: &str, deterministic: bool) -> Result<String, LlmError>;
}
