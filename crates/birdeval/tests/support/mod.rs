#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use birdeval::dataset::Dataset;
use birdeval::llm::{LlmClient, LlmError};
use birdeval::models::{GoldQuery, Question};
use birdeval::sqlite::{DatabaseCatalog, QueryExecutor};
use birdeval::telemetry::{
    CompletionReport, ExecutionReport, RunContext, TelemetryEvent, TelemetrySink,
};
use rusqlite::Connection;

pub const TOY_DB: &str = "toy";

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    let sequence = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}-{sequence}"));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

// Creates `<root>/<db_id>/<db_id>.sqlite` and runs `setup_sql` against it.
pub fn create_database(root: &Path, db_id: &str, setup_sql: &str) -> PathBuf {
    let dir = root.join(db_id);
    std::fs::create_dir_all(&dir).expect("database dir should be creatable");
    let path = dir.join(format!("{db_id}.sqlite"));
    let connection = Connection::open(&path).expect("database should open");
    connection
        .execute_batch(setup_sql)
        .expect("setup sql should run");
    path
}

// Five-row table `t(id, name)` plus a `pets` table referencing it.
pub const TOY_SETUP_SQL: &str = "
    CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    INSERT INTO t (id, name) VALUES (1, 'ada'), (2, 'bob'), (3, 'cy'), (4, 'di'), (5, 'ed');
    CREATE TABLE pets (
        pet_id INTEGER PRIMARY KEY,
        owner_id INTEGER REFERENCES t(id),
        species TEXT DEFAULT 'cat'
    );
    INSERT INTO pets (pet_id, owner_id, species) VALUES (10, 1, 'dog'), (11, 1, 'cat');
";

pub fn toy_catalog(prefix: &str) -> DatabaseCatalog {
    let root = unique_temp_dir(prefix);
    create_database(&root, TOY_DB, TOY_SETUP_SQL);
    DatabaseCatalog::new(root)
}

pub fn toy_executor(prefix: &str) -> QueryExecutor {
    QueryExecutor::new(toy_catalog(prefix))
}

pub fn question(sample_id: usize, text: &str) -> Question {
    Question {
        sample_id,
        question: text.to_string(),
        evidence: "t holds one row per person".to_string(),
        db_id: TOY_DB.to_string(),
    }
}

// Dataset over the toy database with one question per gold statement.
pub fn toy_dataset(gold_sql: &[&str]) -> Dataset {
    let questions = gold_sql
        .iter()
        .enumerate()
        .map(|(sample_id, _)| question(sample_id, &format!("question number {sample_id}")))
        .collect();
    let gold = gold_sql
        .iter()
        .map(|sql| GoldQuery {
            sql: (*sql).to_string(),
            db_id: TOY_DB.to_string(),
        })
        .collect();
    Dataset::new(questions, gold)
}

// Stage a prompt belongs to, recognised by its opening line.
pub fn stage_of(prompt: &str) -> &'static str {
    const OPENINGS: &[(&str, &str)] = &[
        ("You are given the following question", "extract"),
        ("A SQL query must be written", "verify"),
        ("Two reviewers discussed", "merge"),
        ("Write a SQLite query", "generate"),
        ("Judge whether", "judge"),
        ("Produce the final SQL statement", "revise"),
    ];
    OPENINGS
        .iter()
        .find(|(opening, _)| prompt.starts_with(opening))
        .map_or("unknown", |(_, stage)| stage)
}

type Responder = dyn Fn(&str, &str) -> Result<String, LlmError> + Send + Sync;

// LLM double answering from a closure over `(stage, prompt)` and keeping
// every prompt it was sent.
pub struct ScriptedLlm {
    respond: Box<Responder>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    pub fn new(
        respond: impl Fn(&str, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
        })
    }

    // Column-list chatter for the analysis stages, `sql` for the SQL stages.
    pub fn answering(sql: &str) -> Arc<Self> {
        let sql = sql.to_string();
        Self::new(move |stage, _| {
            Ok(match stage {
                "generate" | "revise" => format!("```sql\n{sql};\n```"),
                "judge" => format!("The answer matches.\n{sql}"),
                _ => "t.id, t.name".to_string(),
            })
        })
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().expect("prompt log lock").clone()
    }

    pub fn stages(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .map(|(stage, _)| stage)
            .collect()
    }

    pub fn prompt_for(&self, stage: &str) -> Option<String> {
        self.prompts()
            .into_iter()
            .find(|(recorded, _)| recorded == stage)
            .map(|(_, prompt)| prompt)
    }
}

impl LlmClient for ScriptedLlm {
    fn complete(&self, prompt: &str, deterministic: bool) -> Result<String, LlmError> {
        assert!(deterministic, "pipeline calls must request deterministic output");
        let stage = stage_of(prompt);
        self.prompts
            .lock()
            .expect("prompt log lock")
            .push((stage.to_string(), prompt.to_string()));
        (self.respond)(stage, prompt)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().expect("event log lock").clone()
    }

    pub fn executions(&self) -> Vec<ExecutionReport> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TelemetryEvent::Execution(report) => Some(report),
                TelemetryEvent::Completion(_) => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<CompletionReport> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TelemetryEvent::Completion(report) => Some(report),
                TelemetryEvent::Execution(_) => None,
            })
            .collect()
    }

    pub fn execution_labels(&self) -> Vec<String> {
        self.executions()
            .into_iter()
            .map(|report| report.label)
            .collect()
    }
}

impl TelemetrySink for RecordingSink {
    fn report(&self, event: &TelemetryEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

pub struct FailingSink;

impl TelemetrySink for FailingSink {
    fn report(&self, _event: &TelemetryEvent) -> anyhow::Result<()> {
        anyhow::bail!("telemetry collector unreachable")
    }
}

pub fn recording_context(session_id: &str) -> (RunContext, Arc<RecordingSink>) {
    let sink = RecordingSink::new();
    let context = RunContext::new(session_id, Arc::clone(&sink) as Arc<dyn TelemetrySink>);
    (context, sink)
}

// Recursive CTE that never terminates on its own.
pub const RUNAWAY_SQL: &str =
    "WITH RECURSIVE counter(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM counter) \
     SELECT COUNT(*) FROM counter";
