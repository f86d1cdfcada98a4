//! Transaction scoping shared by repositories and services.

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Runs `op` inside a `BEGIN IMMEDIATE` transaction on `conn`.
///
/// When `conn` already has an open transaction, `op` joins it instead of
/// opening a nested one, so the outermost caller owns commit/rollback.
///
/// # Invariants
/// - The write lock is held before `op` performs its first read.
/// - Any `Err` from `op` rolls back every statement issued by `op`.
pub fn with_immediate_tx<T, E, F>(conn: &Connection, op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    if !conn.is_autocommit() {
        return op();
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    // Dropping `tx` on the error path rolls back.
    let value = op()?;
    tx.commit()?;
    Ok(value)
}
