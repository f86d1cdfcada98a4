//! Unit-of-work over cycle and link repositories.
//!
//! # Responsibility
//! - Hand services both repositories bound to one connection.
//! - Scope a multi-step operation in one transaction.
//!
//! # Invariants
//! - Both repositories always share the same connection, so every statement
//!   issued inside `atomically` commits or rolls back together.

use crate::db::migrations::latest_version;
use crate::db::with_immediate_tx;
use crate::repo::cycle_repo::{RepoError, RepoResult, SqliteWatchCycleRepository, WatchCycleRepository};
use crate::repo::link_repo::{LinkRepository, SqliteLinkRepository};
use rusqlite::Connection;

/// Store contract consumed by the allocator and lifecycle services.
pub trait TechWatchStore {
    type Cycles: WatchCycleRepository;
    type Links: LinkRepository;

    fn cycles(&self) -> &Self::Cycles;
    fn links(&self) -> &Self::Links;

    /// Runs `op` as one atomic unit; nested calls join the outer unit.
    fn atomically<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<rusqlite::Error>;
}

/// SQLite-backed store.
#[derive(Clone, Copy)]
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
    cycles: SqliteWatchCycleRepository<'conn>,
    links: SqliteLinkRepository<'conn>,
}

impl<'conn> SqliteStore<'conn> {
    /// Binds a store to a connection produced by `open_db*`.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        Ok(Self {
            conn,
            cycles: SqliteWatchCycleRepository::new(conn),
            links: SqliteLinkRepository::new(conn),
        })
    }
}

impl<'conn> TechWatchStore for SqliteStore<'conn> {
    type Cycles = SqliteWatchCycleRepository<'conn>;
    type Links = SqliteLinkRepository<'conn>;

    fn cycles(&self) -> &Self::Cycles {
        &self.cycles
    }

    fn links(&self) -> &Self::Links {
        &self.links
    }

    fn atomically<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        with_immediate_tx(self.conn, || op(self))
    }
}
