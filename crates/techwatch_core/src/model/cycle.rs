//! Watch-cycle domain model.
//!
//! # Responsibility
//! - Define the dated, capacity-bounded review session record.
//! - Map cycle status between API, storage and import spellings.
//!
//! # Invariants
//! - `scheduled_date` is unique across all cycles (enforced by storage).
//! - `capacity` is strictly positive.
//! - `Completed` is terminal: nothing transitions out of it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a watch cycle.
pub type CycleId = Uuid;

/// Lifecycle state of a watch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    /// Scheduled, accepting links, not yet under review.
    Planned,
    /// The single session currently under review.
    Active,
    /// Reviewed and closed.
    Completed,
}

impl CycleStatus {
    pub const ALL: [CycleStatus; 3] = [Self::Planned, Self::Active, Self::Completed];

    /// Storage spelling used by the `watch_cycles.status` column.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Parses the storage spelling.
    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "planned" => Some(Self::Planned),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Parses user or archive input, ignoring case and surrounding blanks.
    pub fn parse(value: &str) -> Option<Self> {
        Self::from_db_str(value.trim().to_ascii_lowercase().as_str())
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

impl Display for CycleStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Planned => "PLANNED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
        })
    }
}

/// Persisted watch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchCycle {
    pub id: CycleId,
    pub scheduled_date: NaiveDate,
    pub status: CycleStatus,
    /// Maximum number of links the cycle accepts.
    pub capacity: u32,
}

impl WatchCycle {
    pub fn is_active(&self) -> bool {
        self.status == CycleStatus::Active
    }

    /// Whether the allocator may still route links into this cycle.
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Insert model for a cycle that has no identity yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWatchCycle {
    pub scheduled_date: NaiveDate,
    pub status: CycleStatus,
    pub capacity: u32,
}

impl NewWatchCycle {
    /// Assigns a fresh stable id.
    pub fn into_cycle(self) -> WatchCycle {
        WatchCycle {
            id: Uuid::new_v4(),
            scheduled_date: self.scheduled_date,
            status: self.status,
            capacity: self.capacity,
        }
    }
}
