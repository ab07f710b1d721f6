use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::models::{GoldQuery, Question};

pub const QUESTIONS_FILE: &str = "mini_dev_sqlite.json";
pub const GOLD_FILE: &str = "mini_dev_sqlite_gold.sql";
pub const PREDICTIONS_FILE: &str = "predictions.json";

pub const PREDICTION_DELIMITER: &str = "\t----- bird -----\t";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("gold line {line} is not `<sql>\\t<db_id>`")]
    MalformedGoldLine { line: usize },

    #[error("prediction `{key}` is not `<sql>{}<db_id>`", PREDICTION_DELIMITER.escape_debug())]
    MalformedPrediction { key: String },

    #[error("sample {sample_id} is out of range (dataset has {available} samples)")]
    UnknownSample { sample_id: usize, available: usize },
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    #[serde(default)]
    evidence: Option<String>,
    db_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    questions: Vec<Question>,
    gold: Vec<GoldQuery>,
}

impl Dataset {
    #[must_use]
    pub fn new(questions: Vec<Question>, gold: Vec<GoldQuery>) -> Self {
        Self { questions, gold }
    }

    pub fn load(data_dir: &Path) -> Result<Self, DatasetError> {
        let questions = load_questions(&data_dir.join(QUESTIONS_FILE))?;
        let gold = load_gold(&data_dir.join(GOLD_FILE))?;
        if questions.len() != gold.len() {
            tracing::warn!(
                questions = questions.len(),
                gold = gold.len(),
                "question and gold counts differ"
            );
        }
        Ok(Self { questions, gold })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len().min(self.gold.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn question(&self, sample_id: usize) -> Result<&Question, DatasetError> {
        self.questions
            .get(sample_id)
            .filter(|_| sample_id < self.len())
            .ok_or(DatasetError::UnknownSample {
                sample_id,
                available: self.len(),
            })
    }

    pub fn gold(&self, sample_id: usize) -> Result<&GoldQuery, DatasetError> {
        self.gold
            .get(sample_id)
            .filter(|_| sample_id < self.len())
            .ok_or(DatasetError::UnknownSample {
                sample_id,
                available: self.len(),
            })
    }

    #[must_use]
    pub fn sample_ids(&self, limit: Option<usize>) -> Vec<usize> {
        let count = limit.map_or(self.len(), |limit| limit.min(self.len()));
        (0..count).collect()
    }
}

pub fn load_questions(path: &Path) -> Result<Vec<Question>, DatasetError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let entries =
        serde_json::from_str::<Vec<RawQuestion>>(&raw).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(sample_id, entry)| Question {
            sample_id,
            question: entry.question,
            evidence: entry.evidence.unwrap_or_default(),
            db_id: entry.db_id,
        })
        .collect())
}

pub fn load_gold(path: &Path) -> Result<Vec<GoldQuery>, DatasetError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_gold(&raw)
}

pub fn parse_gold(raw: &str) -> Result<Vec<GoldQuery>, DatasetError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let (sql, db_id) = line
                .trim()
                .rsplit_once('\t')
                .ok_or(DatasetError::MalformedGoldLine { line: index + 1 })?;
            let (sql, db_id) = (sql.trim(), db_id.trim());
            if sql.is_empty() || db_id.is_empty() {
                return Err(DatasetError::MalformedGoldLine { line: index + 1 });
            }
            Ok(GoldQuery {
                sql: sql.to_string(),
                db_id: db_id.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub sql: String,
    pub db_id: String,
}

fn line_break_matcher() -> &'static Regex {
    static MATCHER: OnceLock<Regex> = OnceLock::new();
    MATCHER.get_or_init(|| Regex::new(r"[\r\n\t]+").expect("line break regex should compile"))
}

#[must_use]
pub fn collapse_sql(sql: &str) -> String {
    line_break_matcher()
        .replace_all(sql, " ")
        .trim()
        .to_string()
}

#[must_use]
pub fn format_prediction_line(sql: &str, db_id: &str) -> String {
    format!("{}{PREDICTION_DELIMITER}{db_id}", collapse_sql(sql))
}

pub fn parse_prediction_line(key: &str, line: &str) -> Result<Prediction, DatasetError> {
    let (sql, db_id) =
        line.rsplit_once(PREDICTION_DELIMITER)
            .ok_or_else(|| DatasetError::MalformedPrediction {
                key: key.to_string(),
            })?;
    Ok(Prediction {
        sql: sql.trim().to_string(),
        db_id: db_id.trim().to_string(),
    })
}

pub fn write_predictions_artifact(
    path: &Path,
    predictions: &BTreeMap<usize, Prediction>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create predictions directory: {}",
                parent.display()
            )
        })?;
    }

    let encoded = serde_json::to_vec_pretty(&PredictionLines(predictions))
        .context("failed to encode predictions artifact")?;
    std::fs::write(path, encoded)
        .with_context(|| format!("failed to write predictions artifact: {}", path.display()))
}

struct PredictionLines<'a>(&'a BTreeMap<usize, Prediction>);

impl Serialize for PredictionLines<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(sample_id, prediction)| {
            (
                sample_id.to_string(),
                format_prediction_line(&prediction.sql, &prediction.db_id),
            )
        }))
    }
}

pub fn read_predictions_artifact(path: &Path) -> Result<BTreeMap<usize, Prediction>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read predictions artifact: {}", path.display()))?;
    let entries = serde_json::from_str::<BTreeMap<String, String>>(&raw)
        .with_context(|| format!("failed to parse predictions artifact: {}", path.display()))?;

    entries
        .into_iter()
        .map(|(key, line)| {
            let sample_id = key
                .trim()
                .parse::<usize>()
                .with_context(|| format!("prediction key `{key}` is not a sample index"))?;
            let prediction = parse_prediction_line(&key, &line)?;
            Ok((sample_id, prediction))
        })
        .collect()
}
