use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use rusqlite::Connection;
use techwatch_core::db::{open_db, open_db_in_memory};
use techwatch_core::{
    CapacityAllocator, CreateCycleRequest, CycleStatus, EngineConfig, ErrorKind, FixedClock,
    LifecycleController, Link, LinkRepository, LinkService, LinkStatus, NewWatchCycle,
    SqliteStore, TechWatchError, TechWatchStore, WatchCycle, WatchCycleRepository,
};

type Allocator<'conn> = CapacityAllocator<SqliteStore<'conn>, FixedClock>;

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

fn store(conn: &Connection) -> SqliteStore<'_> {
    SqliteStore::try_new(conn).unwrap()
}

fn allocator(conn: &Connection) -> Allocator<'_> {
    CapacityAllocator::new(store(conn), FixedClock::new(day(3, 1)), EngineConfig::default())
}

fn lifecycle(conn: &Connection) -> LifecycleController<SqliteStore<'_>, FixedClock> {
    LifecycleController::new(store(conn), FixedClock::new(day(3, 1)), EngineConfig::default())
}

fn insert_cycle(conn: &Connection, date: NaiveDate, status: CycleStatus, capacity: u32) -> WatchCycle {
    store(conn)
        .cycles()
        .create_cycle(&NewWatchCycle {
            scheduled_date: date,
            status,
            capacity,
        })
        .unwrap()
}

fn add_link(conn: &Connection, slug: &str, status: LinkStatus) -> Link {
    let links = LinkService::new(store(conn));
    let link = links
        .create_link(&format!("Article {slug}"), &format!("https://example.com/{slug}"))
        .unwrap();
    if status == LinkStatus::ToProcess {
        return link;
    }
    links.set_link_status(link.id, status).unwrap()
}

fn reload(conn: &Connection, link: &Link) -> Link {
    LinkService::new(store(conn)).get_link(link.id).unwrap()
}

#[test]
fn empty_store_spills_over_to_a_week_after_today() {
    let conn = open_db_in_memory().unwrap();

    let cycle = allocator(&conn).find_or_create_next_available().unwrap();
    assert_eq!(cycle.scheduled_date, day(3, 8));
    assert_eq!(cycle.status, CycleStatus::Planned);
    assert_eq!(cycle.capacity, 10);
}

#[test]
fn first_fit_skips_completed_and_full_cycles() {
    let conn = open_db_in_memory().unwrap();
    let completed = insert_cycle(&conn, day(3, 4), CycleStatus::Completed, 5);
    let full = insert_cycle(&conn, day(3, 11), CycleStatus::Active, 1);
    let open = insert_cycle(&conn, day(3, 18), CycleStatus::Planned, 5);
    insert_cycle(&conn, day(3, 25), CycleStatus::Planned, 5);

    let filler = add_link(&conn, "filler", LinkStatus::Keep);
    store(&conn).links().add_membership(filler.id, full.id).unwrap();

    let chosen = allocator(&conn).find_or_create_next_available().unwrap();
    assert_eq!(chosen.id, open.id);
    assert_ne!(chosen.id, completed.id);
}

#[test]
fn spillover_is_dated_after_latest_cycle_of_any_status() {
    let conn = open_db_in_memory().unwrap();
    let active = insert_cycle(&conn, day(3, 4), CycleStatus::Active, 1);
    insert_cycle(&conn, day(3, 18), CycleStatus::Completed, 1);
    let filler = add_link(&conn, "filler", LinkStatus::Keep);
    store(&conn).links().add_membership(filler.id, active.id).unwrap();

    let created = allocator(&conn).find_or_create_next_available().unwrap();
    assert_eq!(created.scheduled_date, day(3, 25));
    assert_eq!(created.status, CycleStatus::Planned);
}

#[test]
fn distribute_spills_twelve_links_into_a_new_planned_cycle() {
    let conn = open_db_in_memory().unwrap();
    let active = lifecycle(&conn)
        .create(&CreateCycleRequest {
            scheduled_date: Some(day(3, 4)),
            status: None,
            capacity: None,
        })
        .unwrap();
    let links: Vec<_> = (0..12)
        .map(|index| add_link(&conn, &format!("post-{index}"), LinkStatus::NextCycle))
        .collect();
    let allocator = allocator(&conn);

    assert_eq!(allocator.distribute_next_links().unwrap(), 12);
    assert_eq!(allocator.count_links(active.id).unwrap(), 10);

    let cycles = lifecycle(&conn).list().unwrap();
    assert_eq!(cycles.len(), 2);
    let spill = &cycles[0];
    assert_eq!(spill.status, CycleStatus::Planned);
    assert_eq!(spill.scheduled_date, day(3, 11));
    assert_eq!(allocator.count_links(spill.id).unwrap(), 2);

    for link in &links {
        assert_eq!(reload(&conn, link).status, LinkStatus::Keep);
    }
    // Discovery order decides who spills over.
    assert!(reload(&conn, &links[0]).is_assigned_to(active.id));
    assert!(reload(&conn, &links[11]).is_assigned_to(spill.id));
}

#[test]
fn distribute_counts_only_new_membership_edges() {
    let conn = open_db_in_memory().unwrap();
    let cycle = insert_cycle(&conn, day(3, 4), CycleStatus::Active, 10);
    let allocator = allocator(&conn);

    let already = add_link(&conn, "already", LinkStatus::ToProcess);
    allocator.assign_link_to_next(already.id).unwrap();
    LinkService::new(store(&conn))
        .set_link_status(already.id, LinkStatus::NextCycle)
        .unwrap();
    let fresh = add_link(&conn, "fresh", LinkStatus::NextCycle);
    add_link(&conn, "ignored", LinkStatus::Later);

    assert_eq!(allocator.distribute_next_links().unwrap(), 1);
    assert_eq!(allocator.count_links(cycle.id).unwrap(), 2);
    assert_eq!(reload(&conn, &already).status, LinkStatus::Keep);
    assert_eq!(reload(&conn, &fresh).status, LinkStatus::Keep);
}

#[test]
fn distribute_with_nothing_queued_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    add_link(&conn, "kept", LinkStatus::Keep);

    assert_eq!(allocator(&conn).distribute_next_links().unwrap(), 0);
    assert!(lifecycle(&conn).list().unwrap().is_empty());
}

#[test]
fn assigning_twice_creates_a_single_edge() {
    let conn = open_db_in_memory().unwrap();
    let cycle = insert_cycle(&conn, day(3, 4), CycleStatus::Active, 10);
    let link = add_link(&conn, "twice", LinkStatus::ToProcess);
    let allocator = allocator(&conn);

    let first = allocator.assign_link_to_next(link.id).unwrap();
    let second = allocator.assign_link_to_next(link.id).unwrap();
    assert_eq!(first.id, cycle.id);
    assert_eq!(second.id, cycle.id);
    assert_eq!(allocator.count_links(cycle.id).unwrap(), 1);

    let stored = reload(&conn, &link);
    assert_eq!(stored.status, LinkStatus::Keep);
    assert_eq!(stored.assigned_cycles, vec![cycle.id]);
    assert_eq!(stored.last_assigned_cycle, Some(cycle.id));
}

#[test]
fn assignment_keeps_statuses_other_than_queued_or_untriaged() {
    let conn = open_db_in_memory().unwrap();
    insert_cycle(&conn, day(3, 4), CycleStatus::Active, 10);
    let link = add_link(&conn, "later", LinkStatus::Later);

    allocator(&conn).assign_link_to_next(link.id).unwrap();
    assert_eq!(reload(&conn, &link).status, LinkStatus::Later);
}

#[test]
fn rejected_link_is_refused_without_any_write() {
    let conn = open_db_in_memory().unwrap();
    let link = add_link(&conn, "spam", LinkStatus::Reject);

    let err = allocator(&conn).assign_link_to_next(link.id).unwrap_err();
    assert!(matches!(err, TechWatchError::RejectedLink(id) if id == link.id));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    assert!(lifecycle(&conn).list().unwrap().is_empty());
    let stored = reload(&conn, &link);
    assert!(stored.assigned_cycles.is_empty());
    assert_eq!(stored.status, LinkStatus::Reject);
}

#[test]
fn unknown_link_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let err = allocator(&conn)
        .assign_link_to_next(uuid::Uuid::new_v4())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn removing_membership_clears_hint_but_not_status() {
    let conn = open_db_in_memory().unwrap();
    let cycle = insert_cycle(&conn, day(3, 4), CycleStatus::Active, 10);
    let link = add_link(&conn, "removed", LinkStatus::NextCycle);
    let allocator = allocator(&conn);
    allocator.assign_link_to_next(link.id).unwrap();

    allocator
        .remove_link_from_tech_watch(cycle.id, link.id)
        .unwrap();
    let stored = reload(&conn, &link);
    assert!(stored.assigned_cycles.is_empty());
    assert_eq!(stored.last_assigned_cycle, None);
    assert_eq!(stored.status, LinkStatus::Keep);
    assert_eq!(allocator.count_links(cycle.id).unwrap(), 0);

    let again = allocator
        .remove_link_from_tech_watch(cycle.id, link.id)
        .unwrap_err();
    assert!(matches!(again, TechWatchError::MembershipNotFound { .. }));
    assert_eq!(again.kind(), ErrorKind::NotFound);
}

#[test]
fn removing_hinted_membership_falls_back_to_remaining_cycle() {
    let conn = open_db_in_memory().unwrap();
    let older = insert_cycle(&conn, day(3, 4), CycleStatus::Completed, 10);
    let newer = insert_cycle(&conn, day(3, 11), CycleStatus::Active, 10);
    let link = add_link(&conn, "history", LinkStatus::Keep);
    let raw = store(&conn);
    raw.links().add_membership(link.id, older.id).unwrap();
    raw.links().add_membership(link.id, newer.id).unwrap();
    raw
        .links()
        .set_last_assigned_cycle(link.id, Some(newer.id))
        .unwrap();

    allocator(&conn)
        .remove_link_from_tech_watch(newer.id, link.id)
        .unwrap();
    let stored = reload(&conn, &link);
    assert_eq!(stored.assigned_cycles, vec![older.id]);
    assert_eq!(stored.last_assigned_cycle, Some(older.id));
}

#[test]
fn removal_with_unknown_side_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let cycle = insert_cycle(&conn, day(3, 4), CycleStatus::Active, 10);
    let link = add_link(&conn, "lonely", LinkStatus::Keep);
    let allocator = allocator(&conn);

    let missing_cycle = allocator
        .remove_link_from_tech_watch(uuid::Uuid::new_v4(), link.id)
        .unwrap_err();
    assert!(matches!(missing_cycle, TechWatchError::CycleNotFound(_)));
    let missing_link = allocator
        .remove_link_from_tech_watch(cycle.id, uuid::Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(missing_link, TechWatchError::LinkNotFound(_)));
}

#[test]
fn list_links_is_most_recent_first_and_requires_known_cycle() {
    let conn = open_db_in_memory().unwrap();
    let cycle = insert_cycle(&conn, day(3, 4), CycleStatus::Active, 10);
    let allocator = allocator(&conn);
    let first = add_link(&conn, "first", LinkStatus::ToProcess);
    let second = add_link(&conn, "second", LinkStatus::ToProcess);
    allocator.assign_link_to_next(first.id).unwrap();
    allocator.assign_link_to_next(second.id).unwrap();

    let listed: Vec<_> = allocator
        .list_links(cycle.id)
        .unwrap()
        .into_iter()
        .map(|link| link.id)
        .collect();
    assert_eq!(listed, vec![second.id, first.id]);

    let unknown = uuid::Uuid::new_v4();
    assert_eq!(
        allocator.list_links(unknown).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        allocator.count_links(unknown).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn collect_requires_the_active_cycle() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = lifecycle(&conn);
    let active = lifecycle
        .create(&CreateCycleRequest {
            scheduled_date: Some(day(3, 4)),
            status: None,
            capacity: Some(2),
        })
        .unwrap();
    let planned = lifecycle
        .create(&CreateCycleRequest {
            scheduled_date: Some(day(3, 11)),
            status: None,
            capacity: None,
        })
        .unwrap();
    for index in 0..3 {
        add_link(&conn, &format!("queued-{index}"), LinkStatus::NextCycle);
    }

    let err = lifecycle.collect_next_links(planned.id).unwrap_err();
    assert!(matches!(err, TechWatchError::CycleNotActive(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let missing = lifecycle.collect_next_links(uuid::Uuid::new_v4()).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    assert_eq!(lifecycle.collect_next_links(active.id).unwrap(), 3);
    let allocator = allocator(&conn);
    assert_eq!(allocator.count_links(active.id).unwrap(), 2);
    assert_eq!(allocator.count_links(planned.id).unwrap(), 1);
}

#[test]
fn deleting_a_cycle_recomputes_hints_of_its_links() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = lifecycle(&conn);
    let active = insert_cycle(&conn, day(3, 4), CycleStatus::Active, 10);
    let planned = insert_cycle(&conn, day(3, 11), CycleStatus::Planned, 10);
    let link = add_link(&conn, "moved", LinkStatus::Keep);
    let raw = store(&conn);
    raw.links().add_membership(link.id, active.id).unwrap();
    raw.links().add_membership(link.id, planned.id).unwrap();
    raw
        .links()
        .set_last_assigned_cycle(link.id, Some(planned.id))
        .unwrap();

    assert!(lifecycle.delete(planned.id).unwrap().is_none());
    let stored = reload(&conn, &link);
    assert_eq!(stored.assigned_cycles, vec![active.id]);
    assert_eq!(stored.last_assigned_cycle, Some(active.id));
}

#[test]
fn concurrent_assignments_never_overcommit() {
    const WORKERS: usize = 8;
    const LINKS_PER_WORKER: usize = 5;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("techwatch.db");
    let conn = open_db(&path).unwrap();
    insert_cycle(&conn, day(3, 4), CycleStatus::Active, 3);
    let link_ids: Vec<_> = (0..WORKERS * LINKS_PER_WORKER)
        .map(|index| add_link(&conn, &format!("race-{index}"), LinkStatus::NextCycle).id)
        .collect();

    let barrier = Arc::new(Barrier::new(WORKERS));
    let workers: Vec<_> = link_ids
        .chunks(LINKS_PER_WORKER)
        .map(|chunk| {
            let chunk = chunk.to_vec();
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let allocator = allocator(&conn);
                barrier.wait();
                for link_id in chunk {
                    allocator.assign_link_to_next(link_id).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let allocator = allocator(&conn);
    let mut total = 0;
    for cycle in lifecycle(&conn).list().unwrap() {
        let occupancy = allocator.count_links(cycle.id).unwrap();
        assert!(
            occupancy <= cycle.capacity,
            "cycle {} holds {occupancy} links over capacity {}",
            cycle.scheduled_date,
            cycle.capacity
        );
        total += occupancy as usize;
    }
    assert_eq!(total, link_ids.len());
    for link_id in &link_ids {
        let link = LinkService::new(store(&conn)).get_link(*link_id).unwrap();
        assert_eq!(link.assigned_cycles.len(), 1);
        assert_eq!(link.status, LinkStatus::Keep);
    }
}
