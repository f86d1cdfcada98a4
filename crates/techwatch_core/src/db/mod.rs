//! SQLite connection bootstrap, schema migrations and transaction scoping.
//!
//! # Responsibility
//! - Hand out connections that are configured and fully migrated.
//! - Provide the immediate-transaction helper every store write runs under.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - No cycle or link row is touched before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
mod tx;

pub use open::{open_db, open_db_in_memory};
pub use tx::with_immediate_tx;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build of the engine.
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    /// One migration script failed; nothing from the batch was kept.
    MigrationFailed {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::UnsupportedSchemaVersion { found, supported } => write!(
                f,
                "schema version {found} is not supported (this build knows up to {supported})"
            ),
            Self::MigrationFailed {
                version,
                name,
                source,
            } => write!(f, "migration {version} `{name}` failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
