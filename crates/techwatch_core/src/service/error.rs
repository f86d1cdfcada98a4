//! Service-level error model shared by allocation, lifecycle and import.
//!
//! Every variant maps onto one `ErrorKind`, which is what API layers switch
//! on (404 / 409 / 422 / 400 style). Store failures stay wrapped in `Repo`.

use crate::db::DbError;
use crate::model::cycle::CycleId;
use crate::model::link::LinkId;
use crate::repo::cycle_repo::RepoError;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TechWatchResult<T> = Result<T, TechWatchError>;

/// Caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced link, cycle or membership does not exist.
    NotFound,
    /// Duplicate active cycle, duplicate date or duplicate URL.
    Conflict,
    /// Operation incompatible with the current entity state.
    InvalidState,
    /// Malformed input.
    Validation,
    /// Persistence failure.
    Storage,
}

#[derive(Debug)]
pub enum TechWatchError {
    CycleNotFound(CycleId),
    LinkNotFound(LinkId),
    /// The link exists but is not a member of the cycle.
    MembershipNotFound {
        cycle_id: CycleId,
        link_id: LinkId,
    },
    /// Another cycle already holds `ACTIVE`.
    ActiveCycleExists(CycleId),
    DuplicateDate(NaiveDate),
    DuplicateUrl(String),
    RejectedLink(LinkId),
    CycleNotActive(CycleId),
    /// The cycle is `COMPLETED` and cannot transition any more.
    CycleCompleted(CycleId),
    InvalidCapacity(i64),
    /// Date arithmetic left the supported calendar range.
    DateOutOfRange(NaiveDate),
    MissingField(&'static str),
    InvalidField {
        field: &'static str,
        value: String,
    },
    Repo(RepoError),
}

impl TechWatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CycleNotFound(_) | Self::LinkNotFound(_) | Self::MembershipNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::ActiveCycleExists(_) | Self::DuplicateDate(_) | Self::DuplicateUrl(_) => {
                ErrorKind::Conflict
            }
            Self::RejectedLink(_)
            | Self::CycleNotActive(_)
            | Self::CycleCompleted(_)
            | Self::InvalidCapacity(_)
            | Self::DateOutOfRange(_) => ErrorKind::InvalidState,
            Self::MissingField(_) | Self::InvalidField { .. } => ErrorKind::Validation,
            Self::Repo(_) => ErrorKind::Storage,
        }
    }
}

impl Display for TechWatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleNotFound(id) => write!(f, "watch cycle not found: {id}"),
            Self::LinkNotFound(id) => write!(f, "link not found: {id}"),
            Self::MembershipNotFound { cycle_id, link_id } => {
                write!(f, "link {link_id} is not assigned to watch cycle {cycle_id}")
            }
            Self::ActiveCycleExists(id) => {
                write!(f, "an active watch cycle already exists: {id}")
            }
            Self::DuplicateDate(date) => {
                write!(f, "a watch cycle is already scheduled on {date}")
            }
            Self::DuplicateUrl(url) => write!(f, "a link already exists for url `{url}`"),
            Self::RejectedLink(id) => write!(f, "cannot assign rejected link {id}"),
            Self::CycleNotActive(id) => write!(f, "watch cycle {id} is not active"),
            Self::CycleCompleted(id) => write!(f, "watch cycle {id} is already completed"),
            Self::InvalidCapacity(value) => {
                write!(f, "capacity must be a positive integer, got {value}")
            }
            Self::DateOutOfRange(date) => {
                write!(f, "no successor date can be computed after {date}")
            }
            Self::MissingField(field) => write!(f, "`{field}` is required"),
            Self::InvalidField { field, value } => {
                write!(f, "invalid value `{value}` for `{field}`")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TechWatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TechWatchError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::CycleNotFound(id) => Self::CycleNotFound(id),
            RepoError::LinkNotFound(id) => Self::LinkNotFound(id),
            RepoError::DuplicateDate(date) => Self::DuplicateDate(date),
            RepoError::DuplicateUrl(url) => Self::DuplicateUrl(url),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for TechWatchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::Db(DbError::Sqlite(value)))
    }
}

/// Validates a caller-supplied capacity.
pub(crate) fn validate_capacity(value: i64) -> TechWatchResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|capacity| *capacity > 0)
        .ok_or(TechWatchError::InvalidCapacity(value))
}

#[cfg(test)]
mod tests {
    use super::{validate_capacity, ErrorKind, TechWatchError};
    use crate::repo::cycle_repo::RepoError;
    use chrono::NaiveDate;

    #[test]
    fn capacity_must_be_strictly_positive() {
        assert_eq!(validate_capacity(4).unwrap(), 4);
        assert_eq!(
            validate_capacity(0).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            validate_capacity(-3).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn repo_date_conflict_maps_to_conflict_kind() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 14).unwrap();
        let err = TechWatchError::from(RepoError::DuplicateDate(date));
        assert!(matches!(err, TechWatchError::DuplicateDate(d) if d == date));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn invalid_persisted_data_is_a_storage_error() {
        let err = TechWatchError::from(RepoError::InvalidData("bad row".to_string()));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
