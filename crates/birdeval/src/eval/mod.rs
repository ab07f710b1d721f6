use crate::compare::{distinct_row_counts, matches};
use crate::dataset::{Dataset, DatasetError};
use crate::models::{FailureKind, GoldQuery, ScoreFailure, ScoreRecord, Traced};
use crate::pipeline::{PipelineError, SqlPipeline};
use crate::sqlite::{ExecutionError, QueryExecutor};
use crate::telemetry::RunContext;

pub const GOLD_LABEL: &str = "DB gold";
pub const PREDICTED_LABEL: &str = "DB predicted";

#[derive(Debug, Clone)]
pub struct Evaluator {
    dataset: Dataset,
    pipeline: SqlPipeline,
}

impl Evaluator {
    #[must_use]
    pub fn new(dataset: Dataset, pipeline: SqlPipeline) -> Self {
        Self { dataset, pipeline }
    }

    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[must_use]
    pub fn pipeline(&self) -> &SqlPipeline {
        &self.pipeline
    }

    pub fn evaluate(
        &self,
        context: &RunContext,
        sample_id: usize,
    ) -> Result<ScoreRecord, DatasetError> {
        let question = self.dataset.question(sample_id)?;
        let gold = self.dataset.gold(sample_id)?;

        tracing::info!(
            session = %context.session_id(),
            sample_id,
            db_id = %question.db_id,
            mode = %self.pipeline.mode(),
            "evaluating sample"
        );
        let generated = self
            .pipeline
            .synthesize(context, question)
            .map_err(|error| generation_failure(&error));

        Ok(score(
            self.pipeline.executor(),
            context,
            sample_id,
            generated.as_ref(),
            gold,
        ))
    }
}

#[must_use]
pub fn evaluate_prediction(
    executor: &QueryExecutor,
    context: &RunContext,
    sample_id: usize,
    predicted: &Traced<String>,
    gold: &GoldQuery,
) -> ScoreRecord {
    score(executor, context, sample_id, Ok(predicted), gold)
}

fn score(
    executor: &QueryExecutor,
    context: &RunContext,
    sample_id: usize,
    predicted: Result<&Traced<String>, &ScoreFailure>,
    gold: &GoldQuery,
) -> ScoreRecord {
    // Gold runs first and is attempted even when generation failed.
    let gold_sql = Traced::untracked(gold.sql.clone());
    let gold_rows = executor.execute(context, &gold.db_id, &gold_sql, GOLD_LABEL);

    let record = match predicted {
        Err(failure) => ScoreRecord::failed(sample_id, &gold.db_id, String::new(), failure.clone()),
        Ok(predicted) => {
            let predicted_rows =
                executor.execute(context, &gold.db_id, predicted, PREDICTED_LABEL);
            let predicted_sql = predicted.value.trim().to_string();
            match (predicted_rows, gold_rows) {
                (Err(error), _) => ScoreRecord::failed(
                    sample_id,
                    &gold.db_id,
                    predicted_sql,
                    execution_failure(
                        &error,
                        FailureKind::PredictedExecution,
                        FailureKind::PredictedTimeout,
                    ),
                ),
                (Ok(_), Err(error)) => ScoreRecord::failed(
                    sample_id,
                    &gold.db_id,
                    predicted_sql,
                    execution_failure(&error, FailureKind::GoldExecution, FailureKind::GoldTimeout),
                ),
                (Ok(predicted_rows), Ok(gold_rows)) => {
                    let predicted_rows = &predicted_rows.value.rows;
                    let gold_rows = &gold_rows.value.rows;
                    if matches(predicted_rows, gold_rows) {
                        ScoreRecord::passed(sample_id, &gold.db_id, predicted_sql)
                    } else {
                        let (predicted_distinct, gold_distinct) =
                            distinct_row_counts(predicted_rows, gold_rows);
                        ScoreRecord::failed(
                            sample_id,
                            &gold.db_id,
                            predicted_sql,
                            ScoreFailure::new(
                                FailureKind::ResultMismatch,
                                format!(
                                    "predicted {predicted_distinct} distinct rows, \
                                     gold {gold_distinct} distinct rows; sets differ"
                                ),
                            ),
                        )
                    }
                }
            }
        }
    };

    match &record.failure {
        None => tracing::info!(
            session = %context.session_id(),
            sample_id,
            correct = true,
            "sample scored"
        ),
        Some(failure) => tracing::warn!(
            session = %context.session_id(),
            sample_id,
            correct = false,
            kind = %failure.kind,
            reason = %failure.message,
            "sample scored"
        ),
    }
    record
}

fn generation_failure(error: &PipelineError) -> ScoreFailure {
    let kind = match error {
        PipelineError::Introspection(_) => FailureKind::Introspection,
        PipelineError::Generation(_) => FailureKind::Generation,
    };
    ScoreFailure::new(kind, error.to_string())
}

fn execution_failure(
    error: &ExecutionError,
    failed: FailureKind,
    timed_out: FailureKind,
) -> ScoreFailure {
    let kind = if error.is_timeout() { timed_out } else { failed };
    ScoreFailure::new(kind, error.to_string())
}
