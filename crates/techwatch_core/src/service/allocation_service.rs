//! Capacity allocator: routes links into watch cycles.
//!
//! # Responsibility
//! - Pick the earliest open cycle with spare capacity, creating a spillover
//!   cycle when every open cycle is full.
//! - Own membership writes and the `NEXT_CYCLE`/`TO_PROCESS -> KEEP` move.
//!
//! # Invariants
//! - Occupancy is read live from membership edges, never cached.
//! - Every public call runs in one immediate transaction, so the occupancy
//!   check and the edge insert cannot interleave with another writer.
//! - A `REJECT` link is refused before anything is written.

use crate::config::EngineConfig;
use crate::model::cycle::{CycleId, CycleStatus, NewWatchCycle, WatchCycle};
use crate::model::link::{Link, LinkId, LinkStatus};
use crate::repo::cycle_repo::{DateOrder, WatchCycleRepository};
use crate::repo::link_repo::LinkRepository;
use crate::repo::store::TechWatchStore;
use crate::service::clock::Clock;
use crate::service::error::{TechWatchError, TechWatchResult};
use crate::service::succession::shift_date;
use log::{info, warn};

/// Capacity-based link assignment over a store.
pub struct CapacityAllocator<S: TechWatchStore, C: Clock> {
    store: S,
    clock: C,
    config: EngineConfig,
}

impl<S: TechWatchStore, C: Clock> CapacityAllocator<S, C> {
    pub fn new(store: S, clock: C, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Returns the earliest non-completed cycle with spare capacity.
    ///
    /// When none qualifies a `PLANNED` cycle is created one interval after
    /// the latest known date (or after today on an empty store).
    pub fn find_or_create_next_available(&self) -> TechWatchResult<WatchCycle> {
        self.store
            .atomically(|store| next_available(store, &self.clock, &self.config))
    }

    /// Assigns one link to the next available cycle and returns that cycle.
    ///
    /// # Errors
    /// - `LinkNotFound` when the link does not exist.
    /// - `RejectedLink` when the link is in `REJECT`.
    pub fn assign_link_to_next(&self, link_id: LinkId) -> TechWatchResult<WatchCycle> {
        let (cycle, _) = self.store.atomically(|store| {
            assign_one(store, &self.clock, &self.config, link_id)
        })?;
        Ok(cycle)
    }

    /// Assigns every `NEXT_CYCLE` link, in discovery order.
    ///
    /// The candidate set is read once up front. Returns how many new
    /// membership edges were created.
    pub fn distribute_next_links(&self) -> TechWatchResult<u32> {
        self.store.atomically(|store| {
            let queued = store.links().list_link_ids_by_status(LinkStatus::NextCycle)?;
            let mut assigned = 0_u32;
            for link_id in &queued {
                let (_, new_edge) = assign_one(store, &self.clock, &self.config, *link_id)?;
                if new_edge {
                    assigned += 1;
                }
            }
            info!(
                "event=links_distribute module=service status=ok candidates={} assigned={assigned}",
                queued.len()
            );
            Ok(assigned)
        })
    }

    /// Detaches a link from one cycle. The link status is left untouched.
    ///
    /// # Errors
    /// - `CycleNotFound` / `LinkNotFound` when either side is missing.
    /// - `MembershipNotFound` when the link is not in that cycle.
    pub fn remove_link_from_tech_watch(
        &self,
        cycle_id: CycleId,
        link_id: LinkId,
    ) -> TechWatchResult<()> {
        self.store.atomically(|store| {
            require_cycle(store, cycle_id)?;
            let link = store
                .links()
                .get_link(link_id)?
                .ok_or(TechWatchError::LinkNotFound(link_id))?;

            if !store.links().remove_membership(link_id, cycle_id)? {
                return Err(TechWatchError::MembershipNotFound { cycle_id, link_id });
            }
            if link.last_assigned_cycle == Some(cycle_id) {
                store.links().refresh_last_assigned_cycle(link_id)?;
            }

            info!(
                "event=link_remove module=service status=ok link_id={link_id} cycle_id={cycle_id}"
            );
            Ok(())
        })
    }

    /// Links of one cycle, most recently discovered first.
    pub fn list_links(&self, cycle_id: CycleId) -> TechWatchResult<Vec<Link>> {
        require_cycle(&self.store, cycle_id)?;
        Ok(self.store.links().list_links_in_cycle(cycle_id)?)
    }

    /// Live occupancy of one cycle.
    pub fn count_links(&self, cycle_id: CycleId) -> TechWatchResult<u32> {
        require_cycle(&self.store, cycle_id)?;
        Ok(self.store.links().count_links_in_cycle(cycle_id)?)
    }
}

fn require_cycle<S: TechWatchStore>(store: &S, cycle_id: CycleId) -> TechWatchResult<WatchCycle> {
    store
        .cycles()
        .get_cycle(cycle_id)?
        .ok_or(TechWatchError::CycleNotFound(cycle_id))
}

fn next_available<S: TechWatchStore, C: Clock>(
    store: &S,
    clock: &C,
    config: &EngineConfig,
) -> TechWatchResult<WatchCycle> {
    let cycles = store.cycles().list_cycles(DateOrder::Ascending)?;
    for cycle in cycles.into_iter().filter(WatchCycle::is_open) {
        let occupancy = store.links().count_links_in_cycle(cycle.id)?;
        if occupancy < cycle.capacity {
            return Ok(cycle);
        }
    }

    // Every open cycle is full: spill over past the latest known date.
    let anchor = match store.cycles().latest_scheduled_date()? {
        Some(latest) => latest,
        None => clock.today(),
    };
    let created = store.cycles().create_cycle(&NewWatchCycle {
        scheduled_date: shift_date(anchor, config.cycle_interval_days)?,
        status: CycleStatus::Planned,
        capacity: config.default_capacity,
    })?;
    info!(
        "event=cycle_spillover module=service status=ok cycle_id={} date={} capacity={}",
        created.id, created.scheduled_date, created.capacity
    );
    Ok(created)
}

/// Returns the chosen cycle and whether a new membership edge was written.
fn assign_one<S: TechWatchStore, C: Clock>(
    store: &S,
    clock: &C,
    config: &EngineConfig,
    link_id: LinkId,
) -> TechWatchResult<(WatchCycle, bool)> {
    let link = store
        .links()
        .get_link(link_id)?
        .ok_or(TechWatchError::LinkNotFound(link_id))?;
    if !link.status.is_assignable() {
        warn!("event=link_assign module=service status=rejected link_id={link_id}");
        return Err(TechWatchError::RejectedLink(link_id));
    }

    let cycle = next_available(store, clock, config)?;
    let new_edge = store.links().add_membership(link_id, cycle.id)?;
    store.links().set_last_assigned_cycle(link_id, Some(cycle.id))?;

    let next_status = link.status.after_assignment();
    if next_status != link.status {
        store.links().set_link_status(link_id, next_status)?;
    }

    info!(
        "event=link_assign module=service status=ok link_id={link_id} cycle_id={} new_edge={new_edge}",
        cycle.id
    );
    Ok((cycle, new_edge))
}
