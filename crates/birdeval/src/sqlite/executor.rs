use std::time::{Duration, Instant};

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode};

use super::{CatalogError, Cell, DatabaseCatalog, ResultSet};
use crate::models::{NodeId, Traced};
use crate::telemetry::{
    ExecutionOutcome, ExecutionReport, PREVIEW_ROW_LIMIT, RunContext, TelemetryEvent,
};
use crate::utils::redaction::{DEFAULT_PREVIEW_MAX_CHARS, redact_and_truncate};

pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

const PROGRESS_HANDLER_PERIOD: i32 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("SQL statement is empty")]
    EmptyStatement,

    #[error("failed to prepare query: {0}")]
    Prepare(rusqlite::Error),

    #[error("only read-only statements may be executed")]
    NotReadOnly,

    #[error("query execution failed: {0}")]
    Failed(rusqlite::Error),

    #[error("query exceeded the {}ms execution budget", .limit.as_millis())]
    Timeout { limit: Duration },
}

impl ExecutionError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    catalog: DatabaseCatalog,
    timeout: Duration,
}

impl QueryExecutor {
    #[must_use]
    pub fn new(catalog: DatabaseCatalog) -> Self {
        Self {
            catalog,
            timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &DatabaseCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn execute(
        &self,
        context: &RunContext,
        db_id: &str,
        sql: &Traced<String>,
        label: &str,
    ) -> Result<Traced<ResultSet>, ExecutionError> {
        let node_id = NodeId::generate();
        let statement = sanitize_sql(sql);

        let started = Instant::now();
        let result = self.run(db_id, statement);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let outcome = match &result {
            Ok(rows) => ExecutionOutcome::Rows {
                row_count: rows.row_count(),
                preview: rows.preview_json(PREVIEW_ROW_LIMIT),
            },
            Err(error) => ExecutionOutcome::Error {
                message: redact_and_truncate(&error.to_string(), DEFAULT_PREVIEW_MAX_CHARS).text,
                timed_out: error.is_timeout(),
            },
        };
        context.report(&TelemetryEvent::Execution(ExecutionReport {
            session_id: context.session_id().to_string(),
            node_id: node_id.clone(),
            label: label.to_string(),
            db_id: db_id.to_string(),
            sql: statement.to_string(),
            outcome,
            upstream: sql.provenance.clone(),
            duration_ms,
        }));

        result.map(|rows| Traced::from_node(rows, node_id))
    }

    fn run(&self, db_id: &str, sql: &str) -> Result<ResultSet, ExecutionError> {
        if sql.is_empty() {
            return Err(ExecutionError::EmptyStatement);
        }

        let connection = self.catalog.open_read_only(db_id)?;
        let deadline = Instant::now() + self.timeout;
        connection.progress_handler(
            PROGRESS_HANDLER_PERIOD,
            Some(move || Instant::now() >= deadline),
        );

        fetch_all(&connection, sql).map_err(|error| match error {
            ExecutionError::Prepare(ref source) | ExecutionError::Failed(ref source)
                if is_interrupted(source) =>
            {
                ExecutionError::Timeout {
                    limit: self.timeout,
                }
            }
            other => other,
        })
    }
}

#[must_use]
pub fn sanitize_sql(sql: &Traced<String>) -> &str {
    sql.value.trim()
}

fn fetch_all(connection: &Connection, sql: &str) -> Result<ResultSet, ExecutionError> {
    let mut statement = connection.prepare(sql).map_err(ExecutionError::Prepare)?;
    if !statement.readonly() {
        return Err(ExecutionError::NotReadOnly);
    }

    let columns = statement
        .column_names()
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    let column_count = statement.column_count();

    let mut rows = statement.query([]).map_err(ExecutionError::Failed)?;
    let mut result_rows = Vec::new();
    while let Some(row) = rows.next().map_err(ExecutionError::Failed)? {
        let mut cells = Vec::with_capacity(column_count);
        for index in 0..column_count {
            let value = row
                .get::<usize, SqlValue>(index)
                .map_err(ExecutionError::Failed)?;
            cells.push(Cell::from(value));
        }
        result_rows.push(cells);
    }

    Ok(ResultSet::new(columns, result_rows))
}

fn is_interrupted(error: &rusqlite::Error) -> bool {
    error.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
}

#[cfg(test)]
mod tests {
    use crate::models::{NodeId, Traced};

    use super::sanitize_sql;

    #[test]
    fn sanitize_returns_only_the_trimmed_payload() {
        let traced = Traced::new(
            "  SELECT 1 \n".to_string(),
            vec![NodeId::from("llm-1"), NodeId::from("db-2")],
        );
        assert_eq!(sanitize_sql(&traced), "SELECT 1");
    }
}
