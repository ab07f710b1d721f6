pub mod evaluate;
pub mod generate;
pub mod run;
pub mod schema;
pub mod score;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Error, Result};
use serde_json::json;

use crate::config::{BenchPaths, ExecutionSettings};
use crate::dataset::Dataset;
use crate::llm::{LlmClient, LlmSettings, OpenAiClient};
use crate::models::{CommandEnvelope, CommandFailure};
use crate::sqlite::{DatabaseCatalog, QueryExecutor};
use crate::telemetry::{FanoutSink, JsonlSink, RunContext, TelemetrySink, TracingSink};

#[derive(Debug, Clone)]
pub struct CommandContext {
    pub paths: BenchPaths,
    pub run: RunContext,
}

pub fn build_telemetry(jsonl_path: Option<&Path>) -> Result<Arc<dyn TelemetrySink>> {
    let Some(path) = jsonl_path else {
        return Ok(Arc::new(TracingSink));
    };

    let jsonl = JsonlSink::create(path).map_err(|error| {
        CommandEnvelope::failure(
            "telemetry",
            "telemetry_unavailable",
            "failed to open telemetry log",
            &error,
        )
    })?;
    Ok(Arc::new(FanoutSink::new(vec![
        Arc::new(TracingSink),
        Arc::new(jsonl),
    ])))
}

pub fn connect_llm(command: &str) -> Result<Arc<dyn LlmClient>> {
    let settings = LlmSettings::from_env();
    tracing::debug!(model = %settings.model, base_url = %settings.base_url, "llm configured");
    let client = OpenAiClient::new(settings).map_err(|error| {
        CommandEnvelope::failure(
            command,
            "llm_unconfigured",
            "completion endpoint is not configured",
            &Error::new(error),
        )
    })?;
    Ok(Arc::new(client))
}

pub(crate) fn execution_settings(
    command: &str,
    timeout_secs: f64,
    workers: usize,
) -> Result<ExecutionSettings> {
    ExecutionSettings::new(timeout_secs, workers).map_err(|error| {
        CommandEnvelope::failure(
            command,
            "invalid_settings",
            "execution settings are invalid",
            &error,
        )
    })
}

pub(crate) fn load_dataset(command: &str, paths: &BenchPaths) -> Result<Dataset> {
    Dataset::load(&paths.data_dir).map_err(|error| {
        CommandEnvelope::failure(
            command,
            "dataset_unavailable",
            "failed to load benchmark dataset",
            &Error::new(error),
        )
    })
}

pub(crate) fn build_executor(paths: &BenchPaths, settings: ExecutionSettings) -> QueryExecutor {
    QueryExecutor::new(DatabaseCatalog::new(paths.db_root.clone())).with_timeout(settings.timeout)
}

pub(crate) fn artifact_failure(command: &str, error: &Error) -> Error {
    CommandEnvelope::failure(
        command,
        "artifact_write_failed",
        "failed to write run artifact",
        error,
    )
}

pub(crate) fn emit(command: &str, envelope: &CommandEnvelope) -> Result<()> {
    let encoded = serde_json::to_string(envelope).map_err(|error| {
        Error::new(CommandFailure::new(
            CommandEnvelope::error(
                command,
                "response_encode_failed",
                "failed to encode command response",
            )
            .with_error_details(json!({ "cause": format!("{error:#}") })),
        ))
    })?;
    println!("{encoded}");
    Ok(())
}
