//! Engine services over the store.
//!
//! # Responsibility
//! - Lifecycle controller and capacity allocator for watch cycles.
//! - Archive reconciliation entry point and the minimal link catalog.
//!
//! # Invariants
//! - Every mutating operation is one store transaction.
//! - Errors surface as `TechWatchError`, classified by `ErrorKind`.

pub mod allocation_service;
pub mod clock;
pub mod error;
pub mod import_service;
pub mod lifecycle_service;
pub mod link_service;
pub mod succession;

pub use allocation_service::CapacityAllocator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorKind, TechWatchError, TechWatchResult};
pub use import_service::{
    normalize_imported_status, CycleImportRecord, CycleImporter, ImportSummary,
};
pub use lifecycle_service::{
    CreateCycleRequest, LifecycleController, TransitionOutcome, UpdateCycleRequest,
};
pub use link_service::LinkService;
pub use succession::{plan_succession, Succession};
