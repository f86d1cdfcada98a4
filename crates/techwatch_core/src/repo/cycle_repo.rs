//! Watch-cycle repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide find/list/create/mutate/delete access over `watch_cycles`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - No business rules live here: status transitions are written as asked.
//! - Read paths reject invalid persisted state instead of masking it.
//! - A unique-date violation surfaces as `RepoError::DuplicateDate`.

use crate::db::{with_immediate_tx, DbError};
use crate::model::cycle::{CycleId, CycleStatus, NewWatchCycle, WatchCycle};
use crate::model::link::LinkId;
use crate::repo::link_repo::refresh_last_assigned_cycle;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const CYCLE_SELECT_SQL: &str = "SELECT
    id,
    scheduled_date,
    status,
    capacity
FROM watch_cycles";

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by cycle and link persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    CycleNotFound(CycleId),
    LinkNotFound(LinkId),
    /// Another cycle already owns this scheduled date.
    DuplicateDate(NaiveDate),
    /// Another link already uses this URL.
    DuplicateUrl(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::CycleNotFound(id) => write!(f, "watch cycle not found: {id}"),
            Self::LinkNotFound(id) => write!(f, "link not found: {id}"),
            Self::DuplicateDate(date) => {
                write!(f, "a watch cycle is already scheduled on {date}")
            }
            Self::DuplicateUrl(url) => write!(f, "a link already exists for url `{url}`"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Sort direction for cycle listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    Ascending,
    Descending,
}

/// Repository interface for watch-cycle persistence.
pub trait WatchCycleRepository {
    /// Inserts a cycle with a fresh id and returns the stored record.
    fn create_cycle(&self, cycle: &NewWatchCycle) -> RepoResult<WatchCycle>;
    fn get_cycle(&self, id: CycleId) -> RepoResult<Option<WatchCycle>>;
    fn find_cycle_by_date(&self, date: NaiveDate) -> RepoResult<Option<WatchCycle>>;
    /// Lists cycles in one status, earliest date first.
    fn list_cycles_by_status(&self, status: CycleStatus) -> RepoResult<Vec<WatchCycle>>;
    fn list_cycles(&self, order: DateOrder) -> RepoResult<Vec<WatchCycle>>;
    /// Latest scheduled date across all cycles, whatever their status.
    fn latest_scheduled_date(&self) -> RepoResult<Option<NaiveDate>>;
    /// Overwrites date, status and capacity of an existing cycle.
    fn update_cycle(&self, cycle: &WatchCycle) -> RepoResult<()>;
    fn set_cycle_status(&self, id: CycleId, status: CycleStatus) -> RepoResult<()>;
    /// Deletes a cycle and its membership edges.
    fn delete_cycle(&self, id: CycleId) -> RepoResult<()>;
}

/// SQLite-backed watch-cycle repository.
#[derive(Clone, Copy)]
pub struct SqliteWatchCycleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteWatchCycleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_cycles(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<WatchCycle>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut cycles = Vec::new();
        while let Some(row) = rows.next()? {
            cycles.push(parse_cycle_row(row)?);
        }
        Ok(cycles)
    }
}

impl WatchCycleRepository for SqliteWatchCycleRepository<'_> {
    fn create_cycle(&self, cycle: &NewWatchCycle) -> RepoResult<WatchCycle> {
        let created = cycle.clone().into_cycle();
        self.conn
            .execute(
                "INSERT INTO watch_cycles (
                    id,
                    scheduled_date,
                    status,
                    capacity
                ) VALUES (?1, ?2, ?3, ?4);",
                params![
                    created.id.to_string(),
                    format_date(created.scheduled_date),
                    created.status.as_db_str(),
                    i64::from(created.capacity),
                ],
            )
            .map_err(|err| map_date_conflict(err, created.scheduled_date))?;
        Ok(created)
    }

    fn get_cycle(&self, id: CycleId) -> RepoResult<Option<WatchCycle>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CYCLE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_cycle_row(row)?));
        }
        Ok(None)
    }

    fn find_cycle_by_date(&self, date: NaiveDate) -> RepoResult<Option<WatchCycle>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CYCLE_SELECT_SQL} WHERE scheduled_date = ?1;"))?;
        let mut rows = stmt.query([format_date(date)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_cycle_row(row)?));
        }
        Ok(None)
    }

    fn list_cycles_by_status(&self, status: CycleStatus) -> RepoResult<Vec<WatchCycle>> {
        self.query_cycles(
            &format!("{CYCLE_SELECT_SQL} WHERE status = ?1 ORDER BY scheduled_date ASC;"),
            [status.as_db_str()],
        )
    }

    fn list_cycles(&self, order: DateOrder) -> RepoResult<Vec<WatchCycle>> {
        let sql = match order {
            DateOrder::Ascending => format!("{CYCLE_SELECT_SQL} ORDER BY scheduled_date ASC;"),
            DateOrder::Descending => format!("{CYCLE_SELECT_SQL} ORDER BY scheduled_date DESC;"),
        };
        self.query_cycles(&sql, [])
    }

    fn latest_scheduled_date(&self) -> RepoResult<Option<NaiveDate>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT MAX(scheduled_date) FROM watch_cycles;", [], |row| {
                row.get(0)
            })?;
        value
            .map(|text| parse_date(&text, "watch_cycles.scheduled_date"))
            .transpose()
    }

    fn update_cycle(&self, cycle: &WatchCycle) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE watch_cycles
                 SET
                    scheduled_date = ?2,
                    status = ?3,
                    capacity = ?4,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    cycle.id.to_string(),
                    format_date(cycle.scheduled_date),
                    cycle.status.as_db_str(),
                    i64::from(cycle.capacity),
                ],
            )
            .map_err(|err| map_date_conflict(err, cycle.scheduled_date))?;

        if changed == 0 {
            return Err(RepoError::CycleNotFound(cycle.id));
        }
        Ok(())
    }

    fn set_cycle_status(&self, id: CycleId, status: CycleStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE watch_cycles
             SET
                status = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), status.as_db_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::CycleNotFound(id));
        }
        Ok(())
    }

    fn delete_cycle(&self, id: CycleId) -> RepoResult<()> {
        with_immediate_tx(self.conn, || {
            let hinted_links = links_hinting_at(self.conn, id)?;
            let changed = self
                .conn
                .execute("DELETE FROM watch_cycles WHERE id = ?1;", [id.to_string()])?;
            if changed == 0 {
                return Err(RepoError::CycleNotFound(id));
            }

            for link_id in hinted_links {
                refresh_last_assigned_cycle(self.conn, link_id)?;
            }
            Ok(())
        })
    }
}

fn links_hinting_at(conn: &Connection, cycle_id: CycleId) -> RepoResult<Vec<LinkId>> {
    let mut stmt = conn.prepare("SELECT id FROM links WHERE last_assigned_cycle = ?1;")?;
    let mut rows = stmt.query([cycle_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "links.id")?);
    }
    Ok(ids)
}

fn parse_cycle_row(row: &Row<'_>) -> RepoResult<WatchCycle> {
    let id_text: String = row.get("id")?;
    let date_text: String = row.get("scheduled_date")?;
    let status_text: String = row.get("status")?;
    let status = CycleStatus::from_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid cycle status `{status_text}` in watch_cycles.status"
        ))
    })?;

    let raw_capacity: i64 = row.get("capacity")?;
    let capacity = u32::try_from(raw_capacity)
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid capacity `{raw_capacity}` in watch_cycles.capacity"
            ))
        })?;

    Ok(WatchCycle {
        id: parse_uuid(&id_text, "watch_cycles.id")?,
        scheduled_date: parse_date(&date_text, "watch_cycles.scheduled_date")?,
        status,
        capacity,
    })
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(value: &str, column: &'static str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn map_date_conflict(err: rusqlite::Error, date: NaiveDate) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::DuplicateDate(date)
    } else {
        err.into()
    }
}
