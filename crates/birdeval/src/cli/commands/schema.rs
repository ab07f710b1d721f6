use anyhow::{Error, Result};
use clap::Args;
use serde_json::json;

use super::{CommandContext, emit};
use crate::models::CommandEnvelope;
use crate::schema::describe;
use crate::sqlite::DatabaseCatalog;

const COMMAND: &str = "schema";

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    #[arg(long, value_name = "ID")]
    pub db_id: String,

    #[arg(long, default_value_t = false, help = "Print only the rendered text instead of the JSON envelope")]
    pub text: bool,
}

pub fn run(args: &SchemaArgs, context: &CommandContext) -> Result<()> {
    let catalog = DatabaseCatalog::new(context.paths.db_root.clone());
    let description = describe(&catalog, &args.db_id).map_err(|error| {
        CommandEnvelope::failure(
            COMMAND,
            "introspection_failed",
            "failed to describe database",
            &Error::new(error),
        )
    })?;
    let rendered = description.to_string();

    if args.text {
        println!("{rendered}");
        return Ok(());
    }

    let envelope = CommandEnvelope::ok(
        COMMAND,
        json!({
            "db_id": description.db_id,
            "tables": description.tables,
            "rendered": rendered,
        }),
    )
    .with_meta("table_count", json!(description.tables.len()));
    emit(COMMAND, &envelope)
}
