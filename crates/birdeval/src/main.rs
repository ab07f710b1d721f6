#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use birdeval::cli::app::{Cli, Command, RuntimeArgs};
use birdeval::cli::commands::{self, CommandContext};
use birdeval::config::{BenchPaths, PathOverrides};
use birdeval::logging::init_logging;
use birdeval::models::CommandFailure;
use birdeval::telemetry::RunContext;
use clap::Parser;
use clap::error::ErrorKind;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    if let Err(error) = init_logging(&cli.runtime.log_level, cli.runtime.log_format) {
        eprintln!("birdeval: {error:#}");
        return EXIT_USAGE_ERROR;
    }

    let command_name = cli.command.name();
    tracing::info!(command = command_name, "starting");

    match execute(cli) {
        Ok(()) => {
            tracing::info!(command = command_name, exit_code = EXIT_SUCCESS, "completed");
            EXIT_SUCCESS
        }
        Err(error) => {
            report_failure(&error);
            tracing::error!(
                command = command_name,
                exit_code = EXIT_RUNTIME_FAILURE,
                error = %format!("{error:#}"),
                "failed"
            );
            EXIT_RUNTIME_FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let paths = resolve_bench_paths(&cli.runtime)?;
    let telemetry = commands::build_telemetry(cli.runtime.telemetry_jsonl.as_deref())?;
    let context = CommandContext {
        paths,
        run: RunContext::with_generated_session(telemetry),
    };
    tracing::debug!(
        session = %context.run.session_id(),
        data_dir = %context.paths.data_dir.display(),
        db_root = %context.paths.db_root.display(),
        out_dir = %context.paths.out_dir.display(),
        "runtime resolved"
    );

    let command_name = cli.command.name();
    match &cli.command {
        Command::Generate(args) => {
            commands::generate::run(args, &context, commands::connect_llm(command_name)?)
        }
        Command::Evaluate(args) => {
            commands::evaluate::run(args, &context, commands::connect_llm(command_name)?)
        }
        Command::Run(args) => {
            commands::run::run(args, &context, commands::connect_llm(command_name)?)
        }
        Command::Score(args) => commands::score::run(args, &context),
        Command::Schema(args) => commands::schema::run(args, &context),
    }
}

fn report_failure(error: &anyhow::Error) {
    match error.downcast_ref::<CommandFailure>() {
        Some(failure) => match serde_json::to_string(failure.envelope()) {
            Ok(encoded) => println!("{encoded}"),
            Err(_) => eprintln!("{error:#}"),
        },
        None => eprintln!("{error:#}"),
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn resolve_bench_paths(args: &RuntimeArgs) -> Result<BenchPaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    birdeval::config::resolve_bench_paths(
        &home_dir,
        &cwd,
        PathOverrides {
            data_dir: args.data_dir.as_deref(),
            db_root: args.db_root.as_deref(),
            out_dir: args.out_dir.as_deref(),
        },
    )
}
