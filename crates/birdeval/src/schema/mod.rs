use std::fmt::{Display, Formatter};

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde::Serialize;

use crate::sqlite::{
    CatalogError, Cell, DatabaseCatalog, sqlite_quoted_identifier, sqlite_single_quoted,
};

pub const NO_DATA_MARKER: &str = "No data available";

#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to list tables: {0}")]
    ListTables(rusqlite::Error),

    #[error("failed to introspect table `{table}`: {source}")]
    Table {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyEdge {
    pub from_column: String,
    pub ref_table: String,
    pub ref_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ExampleRow {
    Row(Vec<(String, String)>),
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescription {
    pub name: String,
    pub columns: Vec<ColumnDescription>,
    pub foreign_keys: Vec<ForeignKeyEdge>,
    pub example_row: ExampleRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescription {
    pub db_id: String,
    pub tables: Vec<TableDescription>,
}

impl SchemaDescription {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDescription> {
        self.tables.iter().find(|table| table.name == name)
    }
}

pub fn describe(
    catalog: &DatabaseCatalog,
    db_id: &str,
) -> Result<SchemaDescription, IntrospectionError> {
    let connection = catalog.open_read_only(db_id)?;
    let table_names = load_table_names(&connection)?;

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let columns = load_columns(&connection, &name)?;
        let foreign_keys = load_foreign_keys(&connection, &name)?;
        let example_row = load_example_row(&connection, &name);
        tables.push(TableDescription {
            name,
            columns,
            foreign_keys,
            example_row,
        });
    }

    tracing::debug!(db_id, tables = tables.len(), "schema introspected");
    Ok(SchemaDescription {
        db_id: db_id.to_string(),
        tables,
    })
}

fn load_table_names(connection: &Connection) -> Result<Vec<String>, IntrospectionError> {
    let mut statement = connection
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
             ORDER BY rowid",
        )
        .map_err(IntrospectionError::ListTables)?;
    let rows = statement
        .query_map([], |row| row.get::<usize, String>(0))
        .map_err(IntrospectionError::ListTables)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(IntrospectionError::ListTables)
}

fn load_columns(
    connection: &Connection,
    table: &str,
) -> Result<Vec<ColumnDescription>, IntrospectionError> {
    let table_error = |source| IntrospectionError::Table {
        table: table.to_string(),
        source,
    };
    let pragma_sql = format!("PRAGMA table_info({})", sqlite_single_quoted(table));
    let mut statement = connection.prepare(&pragma_sql).map_err(table_error)?;
    let rows = statement
        .query_map([], |row| {
            Ok(ColumnDescription {
                name: row.get::<usize, String>(1)?,
                declared_type: row.get::<usize, Option<String>>(2)?.unwrap_or_default(),
                not_null: row.get::<usize, i64>(3)? != 0,
                default_value: row.get::<usize, Option<String>>(4)?,
                primary_key: row.get::<usize, i64>(5)? > 0,
            })
        })
        .map_err(table_error)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(table_error)
}

fn load_foreign_keys(
    connection: &Connection,
    table: &str,
) -> Result<Vec<ForeignKeyEdge>, IntrospectionError> {
    let table_error = |source| IntrospectionError::Table {
        table: table.to_string(),
        source,
    };
    let pragma_sql = format!("PRAGMA foreign_key_list({})", sqlite_single_quoted(table));
    let mut statement = connection.prepare(&pragma_sql).map_err(table_error)?;
    let rows = statement
        .query_map([], |row| {
            Ok(ForeignKeyEdge {
                ref_table: row.get::<usize, String>(2)?,
                from_column: row.get::<usize, String>(3)?,
                ref_column: row.get::<usize, Option<String>>(4)?,
            })
        })
        .map_err(table_error)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(table_error)
}

fn load_example_row(connection: &Connection, table: &str) -> ExampleRow {
    let sql = format!("SELECT * FROM {} LIMIT 1", sqlite_quoted_identifier(table));
    let fetched = connection.prepare(&sql).and_then(|mut statement| {
        let columns = statement
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let mut rows = statement.query([])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(columns.len());
        for (index, column) in columns.into_iter().enumerate() {
            let value = Cell::from(row.get::<usize, SqlValue>(index)?);
            values.push((column, render_example_value(&value)));
        }
        Ok(Some(values))
    });

    match fetched {
        Ok(Some(values)) => ExampleRow::Row(values),
        Ok(None) => ExampleRow::NoData,
        Err(error) => {
            tracing::debug!(table, error = %error, "example row unavailable");
            ExampleRow::NoData
        }
    }
}

fn render_example_value(value: &Cell) -> String {
    match value {
        Cell::Null => "None".to_string(),
        Cell::Text(text) => text.clone(),
        other => other.to_string(),
    }
}

impl Display for TableDescription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Table: {}", self.name)?;
        for column in &self.columns {
            write!(f, "  - {}: {}", column.name, column.declared_type)?;
            if column.primary_key {
                f.write_str(" (PRIMARY KEY)")?;
            }
            if column.not_null {
                f.write_str(" NOT NULL")?;
            }
            if let Some(default_value) = &column.default_value {
                write!(f, " DEFAULT {default_value}")?;
            }
            writeln!(f)?;
        }

        if !self.foreign_keys.is_empty() {
            writeln!(f, "  Foreign Keys:")?;
            for edge in &self.foreign_keys {
                match &edge.ref_column {
                    Some(ref_column) => writeln!(
                        f,
                        "    - {} -> {}.{ref_column}",
                        edge.from_column, edge.ref_table
                    )?,
                    None => writeln!(f, "    - {} -> {}", edge.from_column, edge.ref_table)?,
                }
            }
        }

        match &self.example_row {
            ExampleRow::Row(values) => {
                writeln!(f, "  Example row:")?;
                for (column, value) in values {
                    writeln!(f, "    {column}: {value}")?;
                }
                Ok(())
            }
            ExampleRow::NoData => writeln!(f, "  Example row: {NO_DATA_MARKER}"),
        }
    }
}

impl Display for SchemaDescription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, table) in self.tables.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{table}")?;
        }
        Ok(())
    }
}
