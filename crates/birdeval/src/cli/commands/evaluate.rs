use std::sync::Arc;

use anyhow::{Error, Result};
use clap::Args;
use serde_json::json;

use super::{CommandContext, build_executor, emit, execution_settings, load_dataset};
use crate::batch::DEFAULT_WORKERS;
use crate::eval::Evaluator;
use crate::llm::LlmClient;
use crate::models::CommandEnvelope;
use crate::pipeline::{PipelineMode, SqlPipeline};

const COMMAND: &str = "evaluate";

#[derive(Debug, Clone, Args)]
pub struct EvaluateArgs {
    #[arg(long, help = "Zero-based index into the dataset")]
    pub sample_id: usize,

    #[arg(long, value_enum, default_value_t = PipelineMode::Full)]
    pub mode: PipelineMode,

    #[arg(long, default_value_t = 30.0)]
    pub timeout_secs: f64,
}

pub fn run(args: &EvaluateArgs, context: &CommandContext, llm: Arc<dyn LlmClient>) -> Result<()> {
    let settings = execution_settings(COMMAND, args.timeout_secs, DEFAULT_WORKERS)?;
    let dataset = load_dataset(COMMAND, &context.paths)?;
    let pipeline = SqlPipeline::new(llm, build_executor(&context.paths, settings), args.mode);
    let evaluator = Evaluator::new(dataset, pipeline);

    let sample_context = context.run.for_sample(args.sample_id);
    let record = evaluator
        .evaluate(&sample_context, args.sample_id)
        .map_err(|error| {
            CommandEnvelope::failure(
                COMMAND,
                "unknown_sample",
                "sample id is not part of the dataset",
                &Error::new(error),
            )
        })?;

    let envelope = CommandEnvelope::ok(COMMAND, json!(record))
        .with_meta("mode", json!(args.mode))
        .with_meta("score", json!(record.score()))
        .with_meta("session_id", json!(sample_context.session_id()));
    emit(COMMAND, &envelope)
}
