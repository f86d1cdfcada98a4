//! Lifecycle controller: the state machine over `WatchCycle.status`.
//!
//! # Responsibility
//! - Cycle CRUD plus `activate` / `complete` transitions.
//! - Keep exactly one cycle `ACTIVE` once any exists, using the shared
//!   promote-or-create routine from `succession`.
//!
//! # Invariants
//! - After every call at most one cycle is `ACTIVE`.
//! - `create` and `activate` refuse a second active cycle with a conflict;
//!   `update` demotes the previous holder instead.
//! - All checks run before the first write, and every call is one
//!   transaction, so a failed call leaves the store unchanged.

use crate::config::EngineConfig;
use crate::model::cycle::{CycleId, CycleStatus, NewWatchCycle, WatchCycle};
use crate::repo::cycle_repo::{DateOrder, WatchCycleRepository};
use crate::repo::store::TechWatchStore;
use crate::service::allocation_service::CapacityAllocator;
use crate::service::clock::Clock;
use crate::service::error::{validate_capacity, TechWatchError, TechWatchResult};
use crate::service::succession::run_succession;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

/// Input for `create`. `scheduled_date` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCycleRequest {
    pub scheduled_date: Option<NaiveDate>,
    pub status: Option<CycleStatus>,
    pub capacity: Option<i64>,
}

/// Partial edit for `update`; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCycleRequest {
    pub status: Option<CycleStatus>,
    pub scheduled_date: Option<NaiveDate>,
    pub capacity: Option<i64>,
}

/// Result of a transition that may hand `ACTIVE` to another cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub cycle: WatchCycle,
    /// Cycle promoted or created to take over `ACTIVE`, if succession ran.
    pub successor: Option<WatchCycle>,
}

pub struct LifecycleController<S: TechWatchStore, C: Clock> {
    store: S,
    clock: C,
    config: EngineConfig,
}

impl<S: TechWatchStore, C: Clock> LifecycleController<S, C> {
    pub fn new(store: S, clock: C, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Creates a cycle.
    ///
    /// When no cycle is active the new one becomes `ACTIVE` whatever was
    /// requested.
    ///
    /// # Errors
    /// - `MissingField` without a date.
    /// - `InvalidCapacity` for a non-positive capacity.
    /// - `ActiveCycleExists` when `ACTIVE` is requested but already held.
    /// - `DuplicateDate` when the date is taken.
    pub fn create(&self, request: &CreateCycleRequest) -> TechWatchResult<WatchCycle> {
        let scheduled_date = request
            .scheduled_date
            .ok_or(TechWatchError::MissingField("scheduledDate"))?;
        let capacity = match request.capacity {
            Some(value) => validate_capacity(value)?,
            None => self.config.default_capacity,
        };

        self.store.atomically(|store| {
            let active = current_active(store)?;
            let status = match (&active, request.status) {
                (Some(active), Some(CycleStatus::Active)) => {
                    return Err(TechWatchError::ActiveCycleExists(active.id));
                }
                (None, _) => CycleStatus::Active,
                (Some(_), requested) => requested.unwrap_or(CycleStatus::Planned),
            };

            let created = store.cycles().create_cycle(&NewWatchCycle {
                scheduled_date,
                status,
                capacity,
            })?;
            info!(
                "event=cycle_create module=service status=ok cycle_id={} date={} cycle_status={} capacity={}",
                created.id, created.scheduled_date, created.status, created.capacity
            );
            Ok(created)
        })
    }

    pub fn get(&self, id: CycleId) -> TechWatchResult<WatchCycle> {
        require_cycle(&self.store, id)
    }

    /// All cycles, latest date first.
    pub fn list(&self) -> TechWatchResult<Vec<WatchCycle>> {
        Ok(self.store.cycles().list_cycles(DateOrder::Descending)?)
    }

    pub fn get_active(&self) -> TechWatchResult<Option<WatchCycle>> {
        current_active(&self.store)
    }

    /// Makes a planned cycle the active one. Re-activating the active cycle
    /// is a no-op.
    ///
    /// # Errors
    /// - `CycleNotFound`, then `ActiveCycleExists`, then `CycleCompleted`.
    pub fn activate(&self, id: CycleId) -> TechWatchResult<WatchCycle> {
        self.store.atomically(|store| {
            let cycle = require_cycle(store, id)?;
            if let Some(active) = current_active(store)? {
                if active.id != id {
                    return Err(TechWatchError::ActiveCycleExists(active.id));
                }
                return Ok(cycle);
            }
            if cycle.status.is_terminal() {
                return Err(TechWatchError::CycleCompleted(id));
            }

            store.cycles().set_cycle_status(id, CycleStatus::Active)?;
            info!("event=cycle_activate module=service status=ok cycle_id={id}");
            require_cycle(store, id)
        })
    }

    /// Closes a cycle, then hands `ACTIVE` to its successor when no other
    /// cycle holds it.
    pub fn complete(&self, id: CycleId) -> TechWatchResult<TransitionOutcome> {
        self.store.atomically(|store| {
            let cycle = require_cycle(store, id)?;
            if cycle.status.is_terminal() {
                return Err(TechWatchError::CycleCompleted(id));
            }

            store.cycles().set_cycle_status(id, CycleStatus::Completed)?;
            info!(
                "event=cycle_complete module=service status=ok cycle_id={id} date={}",
                cycle.scheduled_date
            );

            let successor = if current_active(store)?.is_none() {
                Some(run_succession(store, cycle.scheduled_date, &self.config)?)
            } else {
                None
            };
            Ok(TransitionOutcome {
                cycle: require_cycle(store, id)?,
                successor,
            })
        })
    }

    /// Applies a partial edit.
    ///
    /// Setting `ACTIVE` silently demotes the previous holder to `PLANNED`.
    /// Moving the active cycle to another status runs succession from its
    /// (possibly edited) date.
    ///
    /// # Errors
    /// - `CycleNotFound`, `InvalidCapacity`, `DuplicateDate`, `CycleCompleted`.
    pub fn update(
        &self,
        id: CycleId,
        request: &UpdateCycleRequest,
    ) -> TechWatchResult<TransitionOutcome> {
        let capacity = request.capacity.map(validate_capacity).transpose()?;

        self.store.atomically(|store| {
            let current = require_cycle(store, id)?;
            if let Some(date) = request.scheduled_date {
                if let Some(owner) = store.cycles().find_cycle_by_date(date)? {
                    if owner.id != id {
                        return Err(TechWatchError::DuplicateDate(date));
                    }
                }
            }
            if let Some(status) = request.status {
                if current.status.is_terminal() && status != current.status {
                    return Err(TechWatchError::CycleCompleted(id));
                }
            }

            let edited = WatchCycle {
                id,
                scheduled_date: request.scheduled_date.unwrap_or(current.scheduled_date),
                status: request.status.unwrap_or(current.status),
                capacity: capacity.unwrap_or(current.capacity),
            };

            if edited.is_active() {
                for other in store.cycles().list_cycles_by_status(CycleStatus::Active)? {
                    if other.id != id {
                        store.cycles().set_cycle_status(other.id, CycleStatus::Planned)?;
                        info!(
                            "event=cycle_demote module=service status=ok cycle_id={} replaced_by={id}",
                            other.id
                        );
                    }
                }
            }
            store.cycles().update_cycle(&edited)?;
            info!(
                "event=cycle_update module=service status=ok cycle_id={id} date={} cycle_status={} capacity={}",
                edited.scheduled_date, edited.status, edited.capacity
            );

            let successor = if current.is_active() && !edited.is_active() {
                Some(run_succession(store, edited.scheduled_date, &self.config)?)
            } else {
                None
            };
            Ok(TransitionOutcome {
                cycle: edited,
                successor,
            })
        })
    }

    /// Deletes a cycle with its memberships. Deleting the active cycle runs
    /// succession from its former date; the successor is returned.
    pub fn delete(&self, id: CycleId) -> TechWatchResult<Option<WatchCycle>> {
        self.store.atomically(|store| {
            let cycle = require_cycle(store, id)?;
            store.cycles().delete_cycle(id)?;
            info!(
                "event=cycle_delete module=service status=ok cycle_id={id} cycle_status={}",
                cycle.status
            );

            if cycle.is_active() {
                return run_succession(store, cycle.scheduled_date, &self.config).map(Some);
            }
            Ok(None)
        })
    }
}

impl<S, C> LifecycleController<S, C>
where
    S: TechWatchStore + Clone,
    C: Clock + Clone,
{
    /// Distributes all `NEXT_CYCLE` links on behalf of the active cycle.
    ///
    /// # Errors
    /// - `CycleNotFound` when missing, `CycleNotActive` when not `ACTIVE`.
    pub fn collect_next_links(&self, cycle_id: CycleId) -> TechWatchResult<u32> {
        self.store.atomically(|store| {
            let cycle = require_cycle(store, cycle_id)?;
            if !cycle.is_active() {
                return Err(TechWatchError::CycleNotActive(cycle_id));
            }
            CapacityAllocator::new(store.clone(), self.clock.clone(), self.config.clone())
                .distribute_next_links()
        })
    }
}

fn require_cycle<S: TechWatchStore>(store: &S, id: CycleId) -> TechWatchResult<WatchCycle> {
    store
        .cycles()
        .get_cycle(id)?
        .ok_or(TechWatchError::CycleNotFound(id))
}

fn current_active<S: TechWatchStore>(store: &S) -> TechWatchResult<Option<WatchCycle>> {
    Ok(store
        .cycles()
        .list_cycles_by_status(CycleStatus::Active)?
        .into_iter()
        .next())
}
