mod sinks;

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::models::NodeId;

pub use sinks::{FanoutSink, JsonlSink, TracingSink, telemetry_schema_path};

pub const PREVIEW_ROW_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Execution(ExecutionReport),
    Completion(CompletionReport),
}

impl TelemetryEvent {
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        match self {
            Self::Execution(report) => &report.node_id,
            Self::Completion(report) => &report.node_id,
        }
    }

    #[must_use]
    pub fn upstream(&self) -> &[NodeId] {
        match self {
            Self::Execution(report) => &report.upstream,
            Self::Completion(report) => &report.upstream,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ExecutionReport {
    pub session_id: String,
    pub node_id: NodeId,
    pub label: String,
    pub db_id: String,
    pub sql: String,
    pub outcome: ExecutionOutcome,
    pub upstream: Vec<NodeId>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Rows { row_count: usize, preview: Vec<Value> },
    Error { message: String, timed_out: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CompletionReport {
    pub session_id: String,
    pub node_id: NodeId,
    pub stage: String,
    pub prompt_chars: usize,
    pub response_preview: Option<String>,
    pub error: Option<String>,
    pub upstream: Vec<NodeId>,
    pub duration_ms: u64,
}

/// Best-effort destination for execution and completion events.
pub trait TelemetrySink: Send + Sync {
    fn report(&self, event: &TelemetryEvent) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RunContext {
    session_id: String,
    telemetry: Arc<dyn TelemetrySink>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    #[must_use]
    pub fn new(session_id: impl Into<String>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            session_id: session_id.into(),
            telemetry,
        }
    }

    #[must_use]
    pub fn with_generated_session(telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self::new(NodeId::generate().to_string(), telemetry)
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn for_sample(&self, sample_id: usize) -> Self {
        Self {
            session_id: format!("{}/{sample_id}", self.session_id),
            telemetry: Arc::clone(&self.telemetry),
        }
    }

    pub fn report(&self, event: &TelemetryEvent) {
        if let Err(error) = self.telemetry.report(event) {
            tracing::warn!(
                session = %self.session_id,
                node = %event.node_id(),
                error = %format!("{error:#}"),
                "telemetry report failed; continuing"
            );
        }
    }
}

#[must_use]
pub fn telemetry_json_schema() -> Value {
    let schema = schemars::schema_for!(TelemetryEvent);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        ExecutionOutcome, ExecutionReport, RunContext, TelemetryEvent, TelemetrySink,
        telemetry_json_schema,
    };
    use crate::models::NodeId;

    struct FailingSink;

    impl TelemetrySink for FailingSink {
        fn report(&self, _event: &TelemetryEvent) -> anyhow::Result<()> {
            anyhow::bail!("collector offline")
        }
    }

    fn sample_event() -> TelemetryEvent {
        TelemetryEvent::Execution(ExecutionReport {
            session_id: "s".to_string(),
            node_id: NodeId::from("n1"),
            label: "DB gold".to_string(),
            db_id: "toy".to_string(),
            sql: "SELECT 1".to_string(),
            outcome: ExecutionOutcome::Error {
                message: "no such table: t".to_string(),
                timed_out: false,
            },
            upstream: vec![NodeId::from("n0")],
            duration_ms: 3,
        })
    }

    #[test]
    fn failing_sink_is_swallowed() {
        let context = RunContext::new("session", Arc::new(FailingSink));
        context.report(&sample_event());
    }

    #[test]
    fn sample_context_extends_session_id() {
        let context = RunContext::new("batch-1", Arc::new(FailingSink));
        assert_eq!(context.for_sample(7).session_id(), "batch-1/7");
    }

    #[test]
    fn events_serialize_with_tags() {
        let encoded = serde_json::to_value(sample_event()).expect("event should serialize");
        assert_eq!(encoded["event"], "execution");
        assert_eq!(encoded["outcome"]["status"], "error");
        assert_eq!(encoded["upstream"][0], "n0");
    }

    #[test]
    fn schema_document_is_an_object() {
        assert!(telemetry_json_schema().is_object());
    }
}
