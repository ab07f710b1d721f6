mod executor;
mod result_set;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

pub use executor::{DEFAULT_EXECUTION_TIMEOUT, ExecutionError, QueryExecutor, sanitize_sql};
pub use result_set::{Cell, ResultSet, Row};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid database id `{0}`")]
    InvalidDatabaseId(String),

    #[error("failed to open sqlite database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCatalog {
    root: PathBuf,
}

impl DatabaseCatalog {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self, db_id: &str) -> Result<PathBuf, CatalogError> {
        if !is_valid_database_id(db_id) {
            return Err(CatalogError::InvalidDatabaseId(db_id.to_string()));
        }
        Ok(self.root.join(db_id).join(format!("{db_id}.sqlite")))
    }

    pub fn open_read_only(&self, db_id: &str) -> Result<Connection, CatalogError> {
        let path = self.database_path(db_id)?;
        Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| CatalogError::Open { path, source })
    }
}

fn is_valid_database_id(db_id: &str) -> bool {
    !db_id.is_empty()
        && db_id != "."
        && db_id != ".."
        && db_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

#[must_use]
pub fn sqlite_single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[must_use]
pub fn sqlite_quoted_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{CatalogError, DatabaseCatalog, sqlite_quoted_identifier, sqlite_single_quoted};

    #[test]
    fn database_path_follows_bird_layout() {
        let catalog = DatabaseCatalog::new("/data/dev_databases");
        let path = catalog
            .database_path("california_schools")
            .expect("valid id should resolve");
        assert_eq!(
            path,
            Path::new("/data/dev_databases/california_schools/california_schools.sqlite")
        );
    }

    #[test]
    fn rejects_path_like_database_ids() {
        let catalog = DatabaseCatalog::new("/data");
        for db_id in ["", "..", "../etc", "a/b", "a\\b"] {
            assert!(
                matches!(
                    catalog.database_path(db_id),
                    Err(CatalogError::InvalidDatabaseId(_))
                ),
                "`{db_id}` should be rejected"
            );
        }
    }

    #[test]
    fn missing_database_fails_to_open_instead_of_creating_it() {
        let catalog = DatabaseCatalog::new(std::env::temp_dir().join("birdeval-no-such-root"));
        let error = catalog
            .open_read_only("ghost")
            .expect_err("missing database must not be created");
        assert!(matches!(error, CatalogError::Open { .. }));
        assert!(
            !catalog
                .database_path("ghost")
                .expect("id is valid")
                .exists()
        );
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(sqlite_single_quoted("it's"), "'it''s'");
        assert_eq!(
            sqlite_quoted_identifier("frpm \"2014\""),
            "\"frpm \"\"2014\"\"\""
        );
    }
}
