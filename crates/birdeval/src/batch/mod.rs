mod pool;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Prediction};
use crate::eval::{Evaluator, evaluate_prediction};
use crate::models::{FailureKind, ScoreFailure, ScoreRecord, Traced};
use crate::pipeline::SqlPipeline;
use crate::sqlite::QueryExecutor;
use crate::telemetry::RunContext;

pub use pool::{JobOutcome, run_pool};

pub const DEFAULT_WORKERS: usize = 4;
pub const SCORES_FILE: &str = "scores.json";

#[must_use]
pub fn percentage(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    ((numerator as f64 * 10_000.0) / denominator as f64).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub scores: BTreeMap<usize, ScoreRecord>,
    pub total: usize,
    pub correct: usize,
    pub accuracy_pct: f64,
}

impl BatchReport {
    #[must_use]
    pub fn from_scores(scores: BTreeMap<usize, ScoreRecord>) -> Self {
        let total = scores.len();
        let correct = scores.values().filter(|record| record.correct).count();
        Self {
            scores,
            total,
            correct,
            accuracy_pct: percentage(correct, total),
        }
    }

    #[must_use]
    pub fn scores_artifact(&self) -> ScoresArtifact {
        ScoresArtifact {
            scores: self
                .scores
                .iter()
                .map(|(sample_id, record)| (*sample_id, record.score()))
                .collect(),
            total: self.total,
            correct: self.correct,
            accuracy_pct: self.accuracy_pct,
        }
    }

    #[must_use]
    pub fn failure_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for failure in self.scores.values().filter_map(|record| record.failure.as_ref()) {
            *counts.entry(failure.kind.as_str()).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn predictions(&self) -> BTreeMap<usize, Prediction> {
        self.scores
            .iter()
            .map(|(sample_id, record)| {
                (
                    *sample_id,
                    Prediction {
                        sql: record.predicted_sql.clone(),
                        db_id: record.db_id.clone(),
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoresArtifact {
    pub scores: BTreeMap<usize, u8>,
    pub total: usize,
    pub correct: usize,
    pub accuracy_pct: f64,
}

pub fn write_scores_artifact(path: &Path, report: &BatchReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create scores directory: {}", parent.display())
        })?;
    }

    let encoded = serde_json::to_vec_pretty(&report.scores_artifact())
        .context("failed to encode scores artifact")?;
    std::fs::write(path, encoded)
        .with_context(|| format!("failed to write scores artifact: {}", path.display()))
}

pub fn score_batch<F>(context: &RunContext, ids: &[usize], workers: usize, job: F) -> BatchReport
where
    F: Fn(&RunContext, usize) -> ScoreRecord + Sync,
{
    tracing::info!(
        session = %context.session_id(),
        samples = ids.len(),
        workers,
        "batch started"
    );
    let outcomes = run_pool(ids, workers, |sample_id| {
        job(&context.for_sample(sample_id), sample_id)
    });

    let scores = outcomes
        .into_iter()
        .map(|(sample_id, outcome)| {
            let record = outcome.unwrap_or_else(|message| {
                ScoreRecord::failed(
                    sample_id,
                    "",
                    String::new(),
                    ScoreFailure::new(FailureKind::WorkerPanic, message),
                )
            });
            (sample_id, record)
        })
        .collect();

    let report = BatchReport::from_scores(scores);
    tracing::info!(
        session = %context.session_id(),
        total = report.total,
        correct = report.correct,
        accuracy_pct = report.accuracy_pct,
        "batch finished"
    );
    report
}

pub fn evaluate_batch(
    evaluator: &Evaluator,
    context: &RunContext,
    ids: &[usize],
    workers: usize,
) -> BatchReport {
    score_batch(context, ids, workers, |sample_context, sample_id| {
        evaluator
            .evaluate(sample_context, sample_id)
            .unwrap_or_else(|error| unknown_sample(sample_id, &error))
    })
}

pub fn score_predictions(
    executor: &QueryExecutor,
    dataset: &Dataset,
    context: &RunContext,
    predictions: &BTreeMap<usize, Prediction>,
    workers: usize,
) -> BatchReport {
    let ids = predictions.keys().copied().collect::<Vec<_>>();
    score_batch(context, &ids, workers, |sample_context, sample_id| {
        let (Some(prediction), Ok(gold)) = (predictions.get(&sample_id), dataset.gold(sample_id))
        else {
            return unknown_sample(sample_id, &"no gold query for this sample");
        };
        if prediction.db_id != gold.db_id {
            tracing::warn!(
                sample_id,
                predicted_db = %prediction.db_id,
                gold_db = %gold.db_id,
                "prediction targets a different database; scoring against the gold database"
            );
        }
        evaluate_prediction(
            executor,
            sample_context,
            sample_id,
            &Traced::untracked(prediction.sql.clone()),
            gold,
        )
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub predictions: BTreeMap<usize, Prediction>,
    pub failures: BTreeMap<usize, String>,
}

pub fn generate_batch(
    pipeline: &SqlPipeline,
    dataset: &Dataset,
    context: &RunContext,
    ids: &[usize],
    workers: usize,
) -> GenerationReport {
    tracing::info!(
        session = %context.session_id(),
        samples = ids.len(),
        workers,
        mode = %pipeline.mode(),
        "generation started"
    );
    let outcomes = run_pool(ids, workers, |sample_id| {
        let question = dataset.question(sample_id).map_err(|error| error.to_string())?;
        let sql = pipeline
            .synthesize(&context.for_sample(sample_id), question)
            .map_err(|error| error.to_string())?;
        Ok::<_, String>(Prediction {
            sql: sql.value,
            db_id: question.db_id.clone(),
        })
    });

    let mut report = GenerationReport::default();
    for (sample_id, outcome) in outcomes {
        match outcome.and_then(|generated| generated) {
            Ok(prediction) => {
                report.predictions.insert(sample_id, prediction);
            }
            Err(message) => {
                tracing::warn!(sample_id, error = %message, "generation failed");
                let db_id = dataset
                    .question(sample_id)
                    .map(|question| question.db_id.clone())
                    .unwrap_or_default();
                report.predictions.insert(
                    sample_id,
                    Prediction {
                        sql: String::new(),
                        db_id,
                    },
                );
                report.failures.insert(sample_id, message);
            }
        }
    }
    report
}

fn unknown_sample(sample_id: usize, error: &dyn std::fmt::Display) -> ScoreRecord {
    ScoreRecord::failed(
        sample_id,
        "",
        String::new(),
        ScoreFailure::new(FailureKind::UnknownSample, error.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::{BatchReport, percentage, score_batch};
    use crate::models::{FailureKind, ScoreFailure, ScoreRecord};
    use crate::telemetry::{RunContext, TracingSink};

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn report_counts_correct_samples() {
        let scores = BTreeMap::from([
            (0, ScoreRecord::passed(0, "toy", "SELECT 1".to_string())),
            (
                1,
                ScoreRecord::failed(
                    1,
                    "toy",
                    "SELECT 2".to_string(),
                    ScoreFailure::new(FailureKind::ResultMismatch, "sets differ"),
                ),
            ),
        ]);
        let report = BatchReport::from_scores(scores);
        assert_eq!((report.total, report.correct), (2, 1));
        assert_eq!(report.accuracy_pct, 50.0);

        let artifact = serde_json::to_value(report.scores_artifact()).expect("encodes");
        assert_eq!(artifact["scores"]["0"], 1);
        assert_eq!(artifact["scores"]["1"], 0);
        assert_eq!(report.failure_counts().get("result_mismatch"), Some(&1));
    }

    #[test]
    fn panicking_sample_scores_zero_and_batch_continues() {
        let context = RunContext::new("batch", Arc::new(TracingSink));
        let report = score_batch(&context, &[0, 1, 2], 3, |sample_context, sample_id| {
            assert_ne!(sample_id, 1, "worker crashed");
            assert_eq!(sample_context.session_id(), format!("batch/{sample_id}"));
            ScoreRecord::passed(sample_id, "toy", "SELECT 1".to_string())
        });

        assert_eq!((report.total, report.correct), (3, 2));
        assert_eq!(
            report.scores[&1].failure.as_ref().map(|failure| failure.kind),
            Some(FailureKind::WorkerPanic)
        );
    }
}
