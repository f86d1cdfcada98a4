//! Archive reconciliation entry point for bulk cycle imports.
//!
//! # Responsibility
//! - Upsert imported cycle records keyed by scheduled date.
//! - Attach listed link URLs to the imported cycle.
//!
//! # Invariants
//! - Incoming `ACTIVE` is demoted to `PLANNED` before anything is stored, so
//!   merging archives never produces a second active cycle.
//! - Writes bypass the lifecycle controller and run in one transaction.
//! - URLs that match no stored link are reported, never created.

use crate::config::EngineConfig;
use crate::model::cycle::{CycleStatus, NewWatchCycle, WatchCycle};
use crate::repo::cycle_repo::WatchCycleRepository;
use crate::repo::link_repo::LinkRepository;
use crate::repo::store::TechWatchStore;
use crate::service::error::{validate_capacity, TechWatchError, TechWatchResult};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

/// One cycle as found in an exported archive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleImportRecord {
    pub scheduled_date: NaiveDate,
    pub status: String,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub link_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created: u32,
    pub updated: u32,
    pub memberships_added: u32,
    pub skipped_urls: Vec<String>,
}

/// Demotes `ACTIVE` to `PLANNED`; every other status passes through.
pub fn normalize_imported_status(status: CycleStatus) -> CycleStatus {
    match status {
        CycleStatus::Active => CycleStatus::Planned,
        other => other,
    }
}

pub struct CycleImporter<S: TechWatchStore> {
    store: S,
    config: EngineConfig,
}

impl<S: TechWatchStore> CycleImporter<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Imports all records or none.
    ///
    /// # Errors
    /// - `InvalidField` for an unknown status spelling.
    /// - `InvalidCapacity` for a non-positive capacity.
    pub fn import_cycles(&self, records: &[CycleImportRecord]) -> TechWatchResult<ImportSummary> {
        self.store.atomically(|store| {
            let mut summary = ImportSummary::default();
            for record in records {
                let cycle = self.upsert_cycle(store, record, &mut summary)?;
                for url in &record.link_urls {
                    match store.links().find_link_by_url(url.trim())? {
                        Some(link) => {
                            if store.links().add_membership(link.id, cycle.id)? {
                                summary.memberships_added += 1;
                            }
                        }
                        None => summary.skipped_urls.push(url.clone()),
                    }
                }
            }

            info!(
                "event=cycle_import module=service status=ok records={} created={} updated={} memberships_added={} skipped_urls={}",
                records.len(),
                summary.created,
                summary.updated,
                summary.memberships_added,
                summary.skipped_urls.len()
            );
            Ok(summary)
        })
    }

    fn upsert_cycle(
        &self,
        store: &S,
        record: &CycleImportRecord,
        summary: &mut ImportSummary,
    ) -> TechWatchResult<WatchCycle> {
        let status = CycleStatus::parse(&record.status)
            .map(normalize_imported_status)
            .ok_or_else(|| TechWatchError::InvalidField {
                field: "status",
                value: record.status.clone(),
            })?;
        let capacity = match record.capacity {
            Some(value) => validate_capacity(value)?,
            None => self.config.default_capacity,
        };

        match store.cycles().find_cycle_by_date(record.scheduled_date)? {
            Some(existing) => {
                let updated = WatchCycle {
                    status,
                    capacity,
                    ..existing
                };
                store.cycles().update_cycle(&updated)?;
                summary.updated += 1;
                Ok(updated)
            }
            None => {
                let created = store.cycles().create_cycle(&NewWatchCycle {
                    scheduled_date: record.scheduled_date,
                    status,
                    capacity,
                })?;
                summary.created += 1;
                Ok(created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_imported_status, CycleImportRecord};
    use crate::model::cycle::CycleStatus;

    #[test]
    fn only_active_is_demoted() {
        assert_eq!(
            normalize_imported_status(CycleStatus::Active),
            CycleStatus::Planned
        );
        assert_eq!(
            normalize_imported_status(CycleStatus::Planned),
            CycleStatus::Planned
        );
        assert_eq!(
            normalize_imported_status(CycleStatus::Completed),
            CycleStatus::Completed
        );
    }

    #[test]
    fn record_defaults_optional_fields() {
        let record: CycleImportRecord =
            serde_json::from_str(r#"{"scheduledDate":"2025-03-04","status":"ACTIVE"}"#).unwrap();
        assert_eq!(record.capacity, None);
        assert!(record.link_urls.is_empty());
        assert_eq!(record.status, "ACTIVE");
    }
}
