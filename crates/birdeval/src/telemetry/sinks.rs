use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};

use super::{ExecutionOutcome, TelemetryEvent, TelemetrySink, telemetry_json_schema};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn report(&self, event: &TelemetryEvent) -> Result<()> {
        match event {
            TelemetryEvent::Execution(report) => match &report.outcome {
                ExecutionOutcome::Rows { row_count, .. } => tracing::debug!(
                    session = %report.session_id,
                    node = %report.node_id,
                    label = %report.label,
                    db_id = %report.db_id,
                    rows = row_count,
                    upstream = report.upstream.len(),
                    duration_ms = report.duration_ms,
                    "sql executed"
                ),
                ExecutionOutcome::Error { message, timed_out } => tracing::info!(
                    session = %report.session_id,
                    node = %report.node_id,
                    label = %report.label,
                    db_id = %report.db_id,
                    timed_out,
                    error = %message,
                    duration_ms = report.duration_ms,
                    "sql execution failed"
                ),
            },
            TelemetryEvent::Completion(report) => tracing::debug!(
                session = %report.session_id,
                node = %report.node_id,
                stage = %report.stage,
                prompt_chars = report.prompt_chars,
                failed = report.error.is_some(),
                upstream = report.upstream.len(),
                duration_ms = report.duration_ms,
                "llm completion"
            ),
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create telemetry directory: {}", parent.display())
            })?;
        }

        let schema_path = telemetry_schema_path(path);
        let schema = serde_json::to_vec_pretty(&telemetry_json_schema())
            .context("failed to encode telemetry schema")?;
        std::fs::write(&schema_path, schema).with_context(|| {
            format!(
                "failed to write telemetry schema: {}",
                schema_path.display()
            )
        })?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open telemetry log: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for JsonlSink {
    fn report(&self, event: &TelemetryEvent) -> Result<()> {
        let encoded = serde_json::to_string(event).context("failed to encode telemetry event")?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("telemetry writer lock poisoned"))?;
        writeln!(writer, "{encoded}")
            .and_then(|()| writer.flush())
            .with_context(|| format!("failed to append telemetry: {}", self.path.display()))
    }
}

#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }
}

impl TelemetrySink for FanoutSink {
    fn report(&self, event: &TelemetryEvent) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(error) = sink.report(event) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[must_use]
pub fn telemetry_schema_path(jsonl_path: &Path) -> PathBuf {
    jsonl_path.with_extension("schema.json")
}
