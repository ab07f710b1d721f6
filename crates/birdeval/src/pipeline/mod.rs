pub mod prompts;

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::llm::{LlmClient, LlmError};
use crate::models::{NodeId, Question, Traced, merge_provenance};
use crate::schema::{IntrospectionError, describe};
use crate::sqlite::QueryExecutor;
use crate::telemetry::{CompletionReport, RunContext, TelemetryEvent};
use crate::utils::redaction::{DEFAULT_PREVIEW_MAX_CHARS, redact_and_truncate};

pub const TEST_QUERY_LABEL: &str = "Test query";

pub const JUDGE_ANSWER_ROW_LIMIT: usize = 100;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    #[default]
    Full,
    Minimal,
}

impl PipelineMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Minimal => "minimal",
        }
    }
}

impl Display for PipelineMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Verify,
    Merge,
    Generate,
    Judge,
    Revise,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Verify => "verify",
            Self::Merge => "merge",
            Self::Generate => "generate",
            Self::Judge => "judge",
            Self::Revise => "revise",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{stage} stage: {source}")]
    Completion {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    #[error("{stage} stage returned no usable text")]
    EmptyCompletion { stage: Stage },
}

impl GenerationError {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Completion { stage, .. } | Self::EmptyCompletion { stage } => *stage,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("schema introspection failed: {0}")]
    Introspection(#[from] IntrospectionError),

    #[error("sql generation failed: {0}")]
    Generation(#[from] GenerationError),
}

#[must_use]
/// Strips markdown fences and one trailing `;`. Clean input is returned unchanged.
#[must_use]
pub fn fix_sql_syntax(raw: &str) -> String {
    let mut cleaned = raw.trim();
    if let Some(rest) = cleaned.strip_prefix("```sql") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }

    cleaned = cleaned.trim();
    if let Some(rest) = cleaned.strip_suffix(';') {
        cleaned = rest;
    }
    cleaned.trim().to_string()
}

#[derive(Clone)]
pub struct SqlPipeline {
    llm: Arc<dyn LlmClient>,
    executor: QueryExecutor,
    mode: PipelineMode,
}

impl std::fmt::Debug for SqlPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlPipeline")
            .field("executor", &self.executor)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SqlPipeline {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, executor: QueryExecutor, mode: PipelineMode) -> Self {
        Self {
            llm,
            executor,
            mode,
        }
    }

    #[must_use]
    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    #[must_use]
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn synthesize(
        &self,
        context: &RunContext,
        question: &Question,
    ) -> Result<Traced<String>, PipelineError> {
        let schema = describe(self.executor.catalog(), &question.db_id)?.to_string();
        let db_id = question.db_id.as_str();

        let proposal = self.complete(
            context,
            Stage::Extract,
            &prompts::extract(&prompts::ExtractPrompt {
                question: &question.question,
                db_id,
                schema: &schema,
            }),
            Vec::new(),
        )?;

        let relevant_columns = match self.mode {
            PipelineMode::Minimal => proposal,
            PipelineMode::Full => {
                let critique = self.complete(
                    context,
                    Stage::Verify,
                    &prompts::verify(&prompts::VerifyPrompt {
                        question: &question.question,
                        schema: &schema,
                        proposal: &proposal.value,
                    }),
                    proposal.provenance.clone(),
                )?;
                self.complete(
                    context,
                    Stage::Merge,
                    &prompts::merge(&prompts::MergePrompt {
                        question: &question.question,
                        schema: &schema,
                        proposal: &proposal.value,
                        critique: &critique.value,
                    }),
                    merge_provenance([
                        proposal.provenance.as_slice(),
                        critique.provenance.as_slice(),
                    ]),
                )?
            }
        };

        let sql = self.complete_sql(
            context,
            Stage::Generate,
            &prompts::generate(&prompts::GeneratePrompt {
                question: &question.question,
                db_id,
                relevant_columns: &relevant_columns.value,
                hint: &question.evidence,
            }),
            relevant_columns.provenance.clone(),
        )?;

        if self.mode == PipelineMode::Minimal {
            return Ok(sql);
        }

        let (answer, answer_provenance) =
            match self
                .executor
                .execute(context, db_id, &sql, TEST_QUERY_LABEL)
            {
                Ok(rows) => (rows.value.render_rows(JUDGE_ANSWER_ROW_LIMIT), rows.provenance),
                Err(error) => (format!("Error: {error}"), sql.provenance.clone()),
            };

        let critique = self.complete(
            context,
            Stage::Judge,
            &prompts::judge(&prompts::JudgePrompt {
                question: &question.question,
                db_id,
                sql: &sql.value,
                answer: &answer,
            }),
            merge_provenance([sql.provenance.as_slice(), answer_provenance.as_slice()]),
        )?;

        let revised = self.complete_sql(
            context,
            Stage::Revise,
            &prompts::revise(&prompts::RevisePrompt {
                question: &question.question,
                db_id,
                sql: &sql.value,
                answer: &answer,
                critique: &critique.value,
            }),
            merge_provenance([
                sql.provenance.as_slice(),
                answer_provenance.as_slice(),
                critique.provenance.as_slice(),
            ]),
        )?;
        Ok(revised)
    }

    fn complete_sql(
        &self,
        context: &RunContext,
        stage: Stage,
        prompt: &str,
        upstream: Vec<NodeId>,
    ) -> Result<Traced<String>, GenerationError> {
        let sql = self
            .complete(context, stage, prompt, upstream)?
            .map(|text| fix_sql_syntax(&text));
        if sql.value.is_empty() {
            return Err(GenerationError::EmptyCompletion { stage });
        }
        Ok(sql)
    }

    fn complete(
        &self,
        context: &RunContext,
        stage: Stage,
        prompt: &str,
        upstream: Vec<NodeId>,
    ) -> Result<Traced<String>, GenerationError> {
        let node_id = NodeId::generate();
        let started = Instant::now();
        let result = self.llm.complete(prompt, true);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (response_preview, error) = match &result {
            Ok(text) => (
                Some(redact_and_truncate(text, DEFAULT_PREVIEW_MAX_CHARS).text),
                None,
            ),
            Err(error) => (
                None,
                Some(redact_and_truncate(&error.to_string(), DEFAULT_PREVIEW_MAX_CHARS).text),
            ),
        };
        context.report(&TelemetryEvent::Completion(CompletionReport {
            session_id: context.session_id().to_string(),
            node_id: node_id.clone(),
            stage: stage.as_str().to_string(),
            prompt_chars: prompt.chars().count(),
            response_preview,
            error,
            upstream,
            duration_ms,
        }));

        let text = result.map_err(|source| GenerationError::Completion { stage, source })?;
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion { stage });
        }

        tracing::debug!(
            session = %context.session_id(),
            stage = %stage,
            node = %node_id,
            duration_ms,
            "pipeline stage completed"
        );
        Ok(Traced::from_node(text, node_id))
    }
}
