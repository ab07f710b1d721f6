#![forbid(unsafe_code)]

pub mod batch;
pub mod cli;
pub mod compare;
pub mod config;
pub mod dataset;
pub mod eval;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod sqlite;
pub mod telemetry;
pub mod utils;

pub use cli::app::{Cli, Command};
