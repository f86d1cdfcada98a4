//! Watch-cycle lifecycle and capacity-based link assignment engine.
//! This crate is the single source of truth for cycle and membership invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig, LoggingConfig, TechWatchConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::cycle::{CycleId, CycleStatus, NewWatchCycle, WatchCycle};
pub use model::link::{Link, LinkId, LinkStatus};
pub use repo::cycle_repo::{DateOrder, RepoError, RepoResult, WatchCycleRepository};
pub use repo::link_repo::{LinkRepository, NewLink};
pub use repo::store::{SqliteStore, TechWatchStore};
pub use service::{
    CapacityAllocator, Clock, CreateCycleRequest, CycleImportRecord, CycleImporter, ErrorKind,
    FixedClock, ImportSummary, LifecycleController, LinkService, SystemClock, TechWatchError,
    TechWatchResult, TransitionOutcome, UpdateCycleRequest,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
