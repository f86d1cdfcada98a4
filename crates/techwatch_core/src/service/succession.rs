//! Promote-or-create: the single successor routine behind `complete`,
//! `update` and `delete`.
//!
//! # Responsibility
//! - Decide, from a reference date and the current cycles, which cycle takes
//!   over `ACTIVE` (`plan_succession`, pure).
//! - Carry that decision out against the store (`apply_succession`).
//!
//! # Invariants
//! - Only a `Planned` cycle dated strictly after the reference is promoted.
//! - A created successor is `Active`, dated `reference + interval`, with the
//!   configured default capacity, and is written through the store directly.

use crate::config::EngineConfig;
use crate::model::cycle::{CycleId, CycleStatus, NewWatchCycle, WatchCycle};
use crate::repo::cycle_repo::{DateOrder, WatchCycleRepository};
use crate::repo::store::TechWatchStore;
use crate::service::error::{TechWatchError, TechWatchResult};
use chrono::{Days, NaiveDate};
use log::info;

/// Side effect chosen by `plan_succession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Succession {
    /// Promote this planned cycle to active.
    Promote(CycleId),
    /// Create a new active cycle on this date.
    Create { scheduled_date: NaiveDate },
}

/// Picks the successor for a cycle that just left `ACTIVE`.
///
/// `cycles` may be in any order and may include the reference cycle itself.
///
/// A created successor always lands on exactly `reference + interval_days`.
/// The date is never stepped further forward: when a `Completed` or `Active`
/// cycle already owns it, planning fails and the caller's whole transition
/// rolls back. Deleting or re-dating the blocking cycle unblocks it.
///
/// # Errors
/// - `DateOutOfRange` when `reference + interval_days` overflows the calendar.
/// - `DuplicateDate` when the computed creation date is already taken.
pub fn plan_succession(
    reference: NaiveDate,
    cycles: &[WatchCycle],
    interval_days: u32,
) -> TechWatchResult<Succession> {
    let promoted = cycles
        .iter()
        .filter(|cycle| cycle.status == CycleStatus::Planned && cycle.scheduled_date > reference)
        .min_by_key(|cycle| cycle.scheduled_date);
    if let Some(cycle) = promoted {
        return Ok(Succession::Promote(cycle.id));
    }

    let scheduled_date = shift_date(reference, interval_days)?;
    if cycles
        .iter()
        .any(|cycle| cycle.scheduled_date == scheduled_date)
    {
        return Err(TechWatchError::DuplicateDate(scheduled_date));
    }
    Ok(Succession::Create { scheduled_date })
}

/// Plans and applies the successor in the caller's transaction.
pub(crate) fn run_succession<S: TechWatchStore>(
    store: &S,
    reference: NaiveDate,
    config: &EngineConfig,
) -> TechWatchResult<WatchCycle> {
    let cycles = store.cycles().list_cycles(DateOrder::Ascending)?;
    let succession = plan_succession(reference, &cycles, config.cycle_interval_days)?;
    apply_succession(store, succession, config)
}

/// Writes a planned succession and returns the new active cycle.
pub(crate) fn apply_succession<S: TechWatchStore>(
    store: &S,
    succession: Succession,
    config: &EngineConfig,
) -> TechWatchResult<WatchCycle> {
    match succession {
        Succession::Promote(id) => {
            store.cycles().set_cycle_status(id, CycleStatus::Active)?;
            let promoted = store
                .cycles()
                .get_cycle(id)?
                .ok_or(TechWatchError::CycleNotFound(id))?;
            info!(
                "event=cycle_succession module=service status=ok action=promote cycle_id={} date={}",
                promoted.id, promoted.scheduled_date
            );
            Ok(promoted)
        }
        Succession::Create { scheduled_date } => {
            let created = store.cycles().create_cycle(&NewWatchCycle {
                scheduled_date,
                status: CycleStatus::Active,
                capacity: config.default_capacity,
            })?;
            info!(
                "event=cycle_succession module=service status=ok action=create cycle_id={} date={}",
                created.id, created.scheduled_date
            );
            Ok(created)
        }
    }
}

/// `date + days`, or `DateOutOfRange`.
pub(crate) fn shift_date(date: NaiveDate, days: u32) -> TechWatchResult<NaiveDate> {
    date.checked_add_days(Days::new(u64::from(days)))
        .ok_or(TechWatchError::DateOutOfRange(date))
}
