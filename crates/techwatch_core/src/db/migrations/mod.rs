//! Embedded schema migrations.
//!
//! # Invariants
//! - Versions start at 1 and grow by exactly one per entry.
//! - Pending scripts run in one transaction together with the
//!   `user_version` bump, so a failure leaves the old schema in place.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

/// `(version, name, sql)` in application order.
const MIGRATIONS: &[(u32, &str, &str)] = &[
    (1, "watch_cycles", include_str!("0001_watch_cycles.sql")),
    (2, "links", include_str!("0002_links.sql")),
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |(version, _, _)| *version)
}

/// Brings `conn` up to `latest_version()`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file is ahead of this build.
/// - `MigrationFailed` naming the script that broke.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::UnsupportedSchemaVersion { found, supported });
    }

    let pending: Vec<_> = MIGRATIONS
        .iter()
        .filter(|(version, _, _)| *version > found)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for &&(version, name, sql) in &pending {
        tx.execute_batch(sql)
            .and_then(|()| tx.pragma_update(None, "user_version", version))
            .map_err(|source| {
                error!(
                    "event=db_migrate module=db status=error version={version} name={name} error={source}"
                );
                DbError::MigrationFailed {
                    version,
                    name,
                    source,
                }
            })?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={found} to_version={supported}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::MIGRATIONS;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, (version, _, sql)) in MIGRATIONS.iter().enumerate() {
            assert_eq!(*version as usize, index + 1);
            assert!(!sql.trim().is_empty());
        }
    }
}
