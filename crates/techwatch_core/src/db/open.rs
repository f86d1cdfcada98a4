//! Connection opening for file and in-memory databases.
//!
//! # Invariants
//! - Returned connections enforce foreign keys, so deleting a cycle
//!   cascades its membership edges.
//! - Returned connections are at the latest schema version.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Concurrent writers wait this long for the immediate-transaction lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
enum OpenMode<'a> {
    File(&'a Path),
    Memory,
}

impl OpenMode<'_> {
    fn label(self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    fn connect(self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        }
    }
}

/// Opens (or creates) the database file at `path` and migrates it.
///
/// Emits one `db_open` start event and one ok/error event with duration.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open(OpenMode::File(path.as_ref()))
}

/// Opens a private in-memory database, migrated and empty.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open(OpenMode::Memory)
}

fn open(mode: OpenMode<'_>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let label = mode.label();
    info!("event=db_open module=db status=start mode={label}");

    let result = mode
        .connect()
        .map_err(|err| ("db_open_failed", DbError::from(err)))
        .and_then(|mut conn| match configure(&mut conn) {
            Ok(()) => Ok(conn),
            Err(err) => Err(("db_bootstrap_failed", err)),
        });

    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(conn) => {
            info!("event=db_open module=db status=ok mode={label} duration_ms={duration_ms}");
            Ok(conn)
        }
        Err((error_code, err)) => {
            error!(
                "event=db_open module=db status=error mode={label} duration_ms={duration_ms} error_code={error_code} error={err}"
            );
            Err(err)
        }
    }
}

fn configure(conn: &mut Connection) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
