use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{
    CommandContext, artifact_failure, build_executor, emit, execution_settings, load_dataset,
};
use crate::batch::{DEFAULT_WORKERS, generate_batch};
use crate::dataset::{PREDICTIONS_FILE, write_predictions_artifact};
use crate::llm::LlmClient;
use crate::models::CommandEnvelope;
use crate::pipeline::{PipelineMode, SqlPipeline};

const COMMAND: &str = "generate";

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    #[arg(long, default_value_t = 5, help = "Number of questions to process, from the start of the dataset")]
    pub num_samples: usize,

    #[arg(long, value_enum, default_value_t = PipelineMode::Full)]
    pub mode: PipelineMode,

    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    #[arg(long, default_value_t = 30.0, help = "Budget for the trial execution inside the pipeline")]
    pub timeout_secs: f64,
}

pub fn run(args: &GenerateArgs, context: &CommandContext, llm: Arc<dyn LlmClient>) -> Result<()> {
    let settings = execution_settings(COMMAND, args.timeout_secs, args.workers)?;
    let dataset = load_dataset(COMMAND, &context.paths)?;
    let pipeline = SqlPipeline::new(llm, build_executor(&context.paths, settings), args.mode);

    let ids = dataset.sample_ids(Some(args.num_samples));
    let report = generate_batch(&pipeline, &dataset, &context.run, &ids, settings.workers);

    let predictions_path = context.paths.out_dir.join(PREDICTIONS_FILE);
    write_predictions_artifact(&predictions_path, &report.predictions)
        .map_err(|error| artifact_failure(COMMAND, &error))?;
    tracing::info!(
        path = %predictions_path.display(),
        generated = report.predictions.len() - report.failures.len(),
        failed = report.failures.len(),
        "predictions saved"
    );

    let envelope = CommandEnvelope::ok(
        COMMAND,
        json!({
            "predictions_path": predictions_path.display().to_string(),
            "samples": report.predictions.len(),
            "failed": report.failures,
        }),
    )
    .with_meta("mode", json!(args.mode))
    .with_meta("workers", json!(settings.workers))
    .with_meta("session_id", json!(context.run.session_id()));
    emit(COMMAND, &envelope)
}
