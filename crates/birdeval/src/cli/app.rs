use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    evaluate::EvaluateArgs, generate::GenerateArgs, run::RunArgs, schema::SchemaArgs,
    score::ScoreArgs,
};
use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(
    name = "birdeval",
    version,
    about = "Staged LLM text-to-SQL generation and execution-match scoring for BIRD"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH", help = "Directory holding mini_dev_sqlite.json and mini_dev_sqlite_gold.sql")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH", help = "Directory holding <db_id>/<db_id>.sqlite [default: <data-dir>/dev_databases]")]
    pub db_root: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH", help = "Where predictions.json and scores.json are written")]
    pub out_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[arg(long, global = true, value_name = "PATH", help = "Append every execution and completion event to this JSONL file")]
    pub telemetry_jsonl: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Synthesize SQL for the first N questions and write predictions.json")]
    Generate(GenerateArgs),
    #[command(about = "Synthesize and score a single sample")]
    Evaluate(EvaluateArgs),
    #[command(about = "Synthesize and score a batch, writing predictions.json and scores.json")]
    Run(RunArgs),
    #[command(about = "Score an existing predictions.json without calling the LLM")]
    Score(ScoreArgs),
    #[command(about = "Print the schema description handed to the LLM for one database")]
    Schema(SchemaArgs),
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Generate(_) => "generate",
            Self::Evaluate(_) => "evaluate",
            Self::Run(_) => "run",
            Self::Score(_) => "score",
            Self::Schema(_) => "schema",
        }
    }

    #[must_use]
    pub const fn needs_llm(&self) -> bool {
        matches!(self, Self::Generate(_) | Self::Evaluate(_) | Self::Run(_))
    }
}
