use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub sample_id: usize,
    pub question: String,
    pub evidence: String,
    pub db_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldQuery {
    pub sql: String,
    pub db_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Introspection,
    Generation,
    PredictedExecution,
    PredictedTimeout,
    GoldExecution,
    GoldTimeout,
    ResultMismatch,
    UnknownSample,
    WorkerPanic,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Introspection => "introspection",
            Self::Generation => "generation",
            Self::PredictedExecution => "predicted_execution",
            Self::PredictedTimeout => "predicted_timeout",
            Self::GoldExecution => "gold_execution",
            Self::GoldTimeout => "gold_timeout",
            Self::ResultMismatch => "result_mismatch",
            Self::UnknownSample => "unknown_sample",
            Self::WorkerPanic => "worker_panic",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ScoreFailure {
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub sample_id: usize,
    pub db_id: String,
    pub predicted_sql: String,
    pub correct: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ScoreFailure>,
}

impl ScoreRecord {
    #[must_use]
    pub fn passed(sample_id: usize, db_id: impl Into<String>, predicted_sql: String) -> Self {
        Self {
            sample_id,
            db_id: db_id.into(),
            predicted_sql,
            correct: true,
            failure: None,
        }
    }

    #[must_use]
    pub fn failed(
        sample_id: usize,
        db_id: impl Into<String>,
        predicted_sql: String,
        failure: ScoreFailure,
    ) -> Self {
        Self {
            sample_id,
            db_id: db_id.into(),
            predicted_sql,
            correct: false,
            failure: Some(failure),
        }
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        u8::from(self.correct)
    }
}
