//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow store contract for cycles and link membership.
//! - Isolate SQLite query details from allocation/lifecycle orchestration.
//!
//! # Invariants
//! - Repositories return semantic errors (`CycleNotFound`, `DuplicateDate`)
//!   in addition to DB transport errors.
//! - Repositories never decide transitions; services do.

pub mod cycle_repo;
pub mod link_repo;
pub mod store;
