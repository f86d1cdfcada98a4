//! Link domain model (the subset the engine reads and writes).
//!
//! # Invariants
//! - `assigned_cycles` is the authoritative membership set.
//! - `last_assigned_cycle` is a derived hint; it is recomputed from
//!   `assigned_cycles` whenever the cycle it names loses this link.
//! - A `Reject` link is never assigned to a cycle.

use crate::model::cycle::CycleId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a discovered link.
pub type LinkId = Uuid;

/// Triage state of a discovered link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    /// Not triaged yet.
    ToProcess,
    /// Worth keeping.
    Keep,
    /// Deferred.
    Later,
    /// Dropped; never assignable.
    Reject,
    /// Queued for the next watch cycle.
    NextCycle,
}

impl LinkStatus {
    pub const ALL: [LinkStatus; 5] = [
        Self::ToProcess,
        Self::Keep,
        Self::Later,
        Self::Reject,
        Self::NextCycle,
    ];

    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::ToProcess => "to_process",
            Self::Keep => "keep",
            Self::Later => "later",
            Self::Reject => "reject",
            Self::NextCycle => "next_cycle",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "to_process" => Some(Self::ToProcess),
            "keep" => Some(Self::Keep),
            "later" => Some(Self::Later),
            "reject" => Some(Self::Reject),
            "next_cycle" => Some(Self::NextCycle),
            _ => None,
        }
    }

    /// Parses user input such as `NEXT_CYCLE` or `next-cycle`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::from_db_str(normalized.as_str())
    }

    pub fn is_assignable(self) -> bool {
        self != Self::Reject
    }

    /// Status a link moves to once it lands in a cycle.
    pub fn after_assignment(self) -> Self {
        match self {
            Self::NextCycle | Self::ToProcess => Self::Keep,
            other => other,
        }
    }
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ToProcess => "TO_PROCESS",
            Self::Keep => "KEEP",
            Self::Later => "LATER",
            Self::Reject => "REJECT",
            Self::NextCycle => "NEXT_CYCLE",
        })
    }
}

/// Read model for one link with its cycle memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: LinkId,
    pub title: String,
    pub url: String,
    pub status: LinkStatus,
    /// Epoch milliseconds.
    pub discovered_at: i64,
    /// Cycles this link belongs to, ordered by scheduled date.
    pub assigned_cycles: Vec<CycleId>,
    pub last_assigned_cycle: Option<CycleId>,
}

impl Link {
    pub fn is_assigned_to(&self, cycle_id: CycleId) -> bool {
        self.assigned_cycles.contains(&cycle_id)
    }
}

#[cfg(test)]
mod tests {
    use super::LinkStatus;

    #[test]
    fn queued_and_untriaged_links_become_keep_on_assignment() {
        assert_eq!(LinkStatus::NextCycle.after_assignment(), LinkStatus::Keep);
        assert_eq!(LinkStatus::ToProcess.after_assignment(), LinkStatus::Keep);
        assert_eq!(LinkStatus::Later.after_assignment(), LinkStatus::Later);
        assert_eq!(LinkStatus::Keep.after_assignment(), LinkStatus::Keep);
    }

    #[test]
    fn only_reject_is_unassignable() {
        let unassignable: Vec<_> = LinkStatus::ALL
            .into_iter()
            .filter(|status| !status.is_assignable())
            .collect();
        assert_eq!(unassignable, vec![LinkStatus::Reject]);
    }

    #[test]
    fn parse_tolerates_wire_and_cli_spellings() {
        assert_eq!(LinkStatus::parse("NEXT_CYCLE"), Some(LinkStatus::NextCycle));
        assert_eq!(LinkStatus::parse("next-cycle"), Some(LinkStatus::NextCycle));
        assert_eq!(LinkStatus::parse("archived"), None);
    }
}
