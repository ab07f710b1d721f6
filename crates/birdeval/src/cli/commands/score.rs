use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{
    CommandContext, artifact_failure, build_executor, emit, execution_settings, load_dataset,
};
use crate::batch::{DEFAULT_WORKERS, SCORES_FILE, score_predictions, write_scores_artifact};
use crate::config::resolve_user_path;
use crate::dataset::{PREDICTIONS_FILE, read_predictions_artifact};
use crate::models::CommandEnvelope;

const COMMAND: &str = "score";

#[derive(Debug, Clone, Args)]
pub struct ScoreArgs {
    #[arg(long, value_name = "PATH", help = "Predictions to score [default: <out-dir>/predictions.json]")]
    pub predictions: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    #[arg(long, default_value_t = 30.0)]
    pub timeout_secs: f64,
}

pub fn run(args: &ScoreArgs, context: &CommandContext) -> Result<()> {
    let paths = &context.paths;
    let settings = execution_settings(COMMAND, args.timeout_secs, args.workers)?;
    let predictions_path = match &args.predictions {
        Some(path) => resolve_user_path(path, &paths.home_dir, &paths.cwd)?,
        None => paths.out_dir.join(PREDICTIONS_FILE),
    };

    let predictions = read_predictions_artifact(&predictions_path).map_err(|error| {
        CommandEnvelope::failure(
            COMMAND,
            "predictions_unavailable",
            "failed to read predictions artifact",
            &error,
        )
    })?;
    let dataset = load_dataset(COMMAND, paths)?;
    let executor = build_executor(paths, settings);

    let report = score_predictions(
        &executor,
        &dataset,
        &context.run,
        &predictions,
        settings.workers,
    );

    let scores_path = paths.out_dir.join(SCORES_FILE);
    write_scores_artifact(&scores_path, &report)
        .map_err(|error| artifact_failure(COMMAND, &error))?;

    let envelope = CommandEnvelope::ok(
        COMMAND,
        super::run::summary(&report, &[scores_path.as_path()]),
    )
    .with_meta("predictions_path", json!(predictions_path.display().to_string()))
    .with_meta("workers", json!(settings.workers))
    .with_meta("session_id", json!(context.run.session_id()));
    emit(COMMAND, &envelope)
}
