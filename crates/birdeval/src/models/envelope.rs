use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const COMMAND_ENVELOPE_SCHEMA_VERSION: &str = "birdeval.command-envelope.v1";

pub type CommandEnvelopeMeta = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelopeError {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: CommandEnvelopeMeta,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandEnvelopeError>,
}

#[derive(Debug, Clone)]
pub struct CommandFailure {
    envelope: CommandEnvelope,
}

impl CommandFailure {
    #[must_use]
    pub fn new(envelope: CommandEnvelope) -> Self {
        Self { envelope }
    }

    #[must_use]
    pub fn envelope(&self) -> &CommandEnvelope {
        &self.envelope
    }
}

impl Display for CommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("command envelope serialization failure"),
        }
    }
}

impl std::error::Error for CommandFailure {}

impl CommandEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        Self::base(command, true).with_data(data)
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(CommandEnvelopeError {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = CommandEnvelopeMeta::new();
        meta.insert(
            "schema_version".to_string(),
            json!(COMMAND_ENVELOPE_SCHEMA_VERSION),
        );

        Self {
            ok,
            command: command.into(),
            generated_at_utc: generated_at_utc_now(),
            data: None,
            meta,
            error: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }

    #[must_use]
    pub fn failure(
        command: &str,
        code: &str,
        message: &str,
        error: &anyhow::Error,
    ) -> anyhow::Error {
        let envelope = Self::error(command, code, message)
            .with_error_details(json!({ "cause": format!("{error:#}") }));
        anyhow::Error::new(CommandFailure::new(envelope))
    }
}

fn generated_at_utc_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
