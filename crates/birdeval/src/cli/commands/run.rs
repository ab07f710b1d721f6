use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde_json::{Value, json};

use super::{
    CommandContext, artifact_failure, build_executor, emit, execution_settings, load_dataset,
};
use crate::batch::{BatchReport, DEFAULT_WORKERS, SCORES_FILE, evaluate_batch, write_scores_artifact};
use crate::dataset::{PREDICTIONS_FILE, write_predictions_artifact};
use crate::eval::Evaluator;
use crate::llm::LlmClient;
use crate::models::CommandEnvelope;
use crate::pipeline::{PipelineMode, SqlPipeline};

const COMMAND: &str = "run";

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[arg(long, default_value_t = 5, help = "Number of questions to process, from the start of the dataset")]
    pub num_samples: usize,

    #[arg(long, value_enum, default_value_t = PipelineMode::Full)]
    pub mode: PipelineMode,

    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    #[arg(long, default_value_t = 30.0, help = "Budget for every SQL execution of the run")]
    pub timeout_secs: f64,
}

pub fn run(args: &RunArgs, context: &CommandContext, llm: Arc<dyn LlmClient>) -> Result<()> {
    let settings = execution_settings(COMMAND, args.timeout_secs, args.workers)?;
    let dataset = load_dataset(COMMAND, &context.paths)?;
    let ids = dataset.sample_ids(Some(args.num_samples));
    let pipeline = SqlPipeline::new(llm, build_executor(&context.paths, settings), args.mode);
    let evaluator = Evaluator::new(dataset, pipeline);

    let report = evaluate_batch(&evaluator, &context.run, &ids, settings.workers);

    let predictions_path = context.paths.out_dir.join(PREDICTIONS_FILE);
    let scores_path = context.paths.out_dir.join(SCORES_FILE);
    write_predictions_artifact(&predictions_path, &report.predictions())
        .and_then(|()| write_scores_artifact(&scores_path, &report))
        .map_err(|error| artifact_failure(COMMAND, &error))?;

    let envelope = CommandEnvelope::ok(
        COMMAND,
        summary(&report, &[predictions_path.as_path(), scores_path.as_path()]),
    )
    .with_meta("mode", json!(args.mode))
    .with_meta("workers", json!(settings.workers))
    .with_meta("session_id", json!(context.run.session_id()));
    emit(COMMAND, &envelope)
}

pub(crate) fn summary(report: &BatchReport, artifacts: &[&Path]) -> Value {
    json!({
        "total": report.total,
        "correct": report.correct,
        "accuracy_pct": report.accuracy_pct,
        "failures_by_kind": report.failure_counts(),
        "scores": report.scores_artifact().scores,
        "artifacts": artifacts
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>(),
    })
}
