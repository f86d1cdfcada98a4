//! Link repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the narrow link access the engine needs: lookup, status writes,
//!   membership edges, and per-cycle listing/occupancy.
//! - Own the derived `last_assigned_cycle` hint recomputation.
//!
//! # Invariants
//! - Membership lives only in `link_cycles`; occupancy is `COUNT(*)` over it.
//! - Adding an existing edge is a no-op reported as `false`.
//! - Hint recomputation picks the latest-dated remaining membership.

use crate::model::cycle::CycleId;
use crate::model::link::{Link, LinkId, LinkStatus};
use crate::repo::cycle_repo::{is_unique_violation, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const LINK_SELECT_SQL: &str = "SELECT
    id,
    title,
    url,
    status,
    discovered_at,
    last_assigned_cycle
FROM links";

/// Insert model for a newly discovered link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub title: String,
    pub url: String,
}

/// Repository interface for the link subset used by the engine.
pub trait LinkRepository {
    /// Inserts a link in status `ToProcess`.
    fn create_link(&self, link: &NewLink) -> RepoResult<Link>;
    fn get_link(&self, id: LinkId) -> RepoResult<Option<Link>>;
    fn find_link_by_url(&self, url: &str) -> RepoResult<Option<Link>>;
    fn set_link_status(&self, id: LinkId, status: LinkStatus) -> RepoResult<()>;
    /// Lists ids of links in one status, oldest discovery first.
    fn list_link_ids_by_status(&self, status: LinkStatus) -> RepoResult<Vec<LinkId>>;
    /// Adds a membership edge. Returns `true` when the edge is new.
    fn add_membership(&self, link_id: LinkId, cycle_id: CycleId) -> RepoResult<bool>;
    /// Removes a membership edge. Returns `false` when no edge existed.
    fn remove_membership(&self, link_id: LinkId, cycle_id: CycleId) -> RepoResult<bool>;
    fn set_last_assigned_cycle(
        &self,
        link_id: LinkId,
        cycle_id: Option<CycleId>,
    ) -> RepoResult<()>;
    /// Recomputes the hint from remaining memberships and returns it.
    fn refresh_last_assigned_cycle(&self, link_id: LinkId) -> RepoResult<Option<CycleId>>;
    /// Lists links of one cycle, most recently discovered first.
    fn list_links_in_cycle(&self, cycle_id: CycleId) -> RepoResult<Vec<Link>>;
    fn count_links_in_cycle(&self, cycle_id: CycleId) -> RepoResult<u32>;
}

/// SQLite-backed link repository.
#[derive(Clone, Copy)]
pub struct SqliteLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_one(&self, sql: &str, param: &str) -> RepoResult<Option<Link>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([param])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_link_row(self.conn, row)?));
        }
        Ok(None)
    }
}

impl LinkRepository for SqliteLinkRepository<'_> {
    fn create_link(&self, link: &NewLink) -> RepoResult<Link> {
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO links (id, title, url, status) VALUES (?1, ?2, ?3, ?4);",
                params![
                    id.to_string(),
                    link.title.as_str(),
                    link.url.as_str(),
                    LinkStatus::ToProcess.as_db_str(),
                ],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    RepoError::DuplicateUrl(link.url.clone())
                } else {
                    err.into()
                }
            })?;

        self.get_link(id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("link {id} missing after insert read-back"))
        })
    }

    fn get_link(&self, id: LinkId) -> RepoResult<Option<Link>> {
        self.load_one(
            &format!("{LINK_SELECT_SQL} WHERE id = ?1;"),
            id.to_string().as_str(),
        )
    }

    fn find_link_by_url(&self, url: &str) -> RepoResult<Option<Link>> {
        self.load_one(&format!("{LINK_SELECT_SQL} WHERE url = ?1;"), url)
    }

    fn set_link_status(&self, id: LinkId, status: LinkStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE links SET status = ?2 WHERE id = ?1;",
            params![id.to_string(), status.as_db_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::LinkNotFound(id));
        }
        Ok(())
    }

    fn list_link_ids_by_status(&self, status: LinkStatus) -> RepoResult<Vec<LinkId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM links
             WHERE status = ?1
             ORDER BY discovered_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([status.as_db_str()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "links.id")?);
        }
        Ok(ids)
    }

    fn add_membership(&self, link_id: LinkId, cycle_id: CycleId) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO link_cycles (link_id, cycle_id) VALUES (?1, ?2);",
            params![link_id.to_string(), cycle_id.to_string()],
        )?;
        Ok(inserted == 1)
    }

    fn remove_membership(&self, link_id: LinkId, cycle_id: CycleId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM link_cycles WHERE link_id = ?1 AND cycle_id = ?2;",
            params![link_id.to_string(), cycle_id.to_string()],
        )?;
        Ok(removed == 1)
    }

    fn set_last_assigned_cycle(
        &self,
        link_id: LinkId,
        cycle_id: Option<CycleId>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE links SET last_assigned_cycle = ?2 WHERE id = ?1;",
            params![link_id.to_string(), cycle_id.map(|id| id.to_string())],
        )?;
        if changed == 0 {
            return Err(RepoError::LinkNotFound(link_id));
        }
        Ok(())
    }

    fn refresh_last_assigned_cycle(&self, link_id: LinkId) -> RepoResult<Option<CycleId>> {
        refresh_last_assigned_cycle(self.conn, link_id)
    }

    fn list_links_in_cycle(&self, cycle_id: CycleId) -> RepoResult<Vec<Link>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                l.id AS id,
                l.title AS title,
                l.url AS url,
                l.status AS status,
                l.discovered_at AS discovered_at,
                l.last_assigned_cycle AS last_assigned_cycle
             FROM links l
             INNER JOIN link_cycles lc ON lc.link_id = l.id
             WHERE lc.cycle_id = ?1
             ORDER BY l.discovered_at DESC, l.rowid DESC;",
        )?;
        let mut rows = stmt.query([cycle_id.to_string()])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(parse_link_row(self.conn, row)?);
        }
        Ok(links)
    }

    fn count_links_in_cycle(&self, cycle_id: CycleId) -> RepoResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM link_cycles WHERE cycle_id = ?1;",
            [cycle_id.to_string()],
            |row| row.get(0),
        )?;
        u32::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("occupancy {count} out of range")))
    }
}

/// Points the hint at the latest-dated cycle the link still belongs to.
pub(crate) fn refresh_last_assigned_cycle(
    conn: &Connection,
    link_id: LinkId,
) -> RepoResult<Option<CycleId>> {
    let replacement = load_membership(conn, &link_id.to_string())?.pop();
    conn.execute(
        "UPDATE links SET last_assigned_cycle = ?2 WHERE id = ?1;",
        params![link_id.to_string(), replacement.map(|id| id.to_string())],
    )?;
    Ok(replacement)
}

/// Loads membership ordered by scheduled date, earliest first.
fn load_membership(conn: &Connection, link_id: &str) -> RepoResult<Vec<CycleId>> {
    let mut stmt = conn.prepare(
        "SELECT lc.cycle_id
         FROM link_cycles lc
         INNER JOIN watch_cycles wc ON wc.id = lc.cycle_id
         WHERE lc.link_id = ?1
         ORDER BY wc.scheduled_date ASC;",
    )?;
    let mut rows = stmt.query([link_id])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "link_cycles.cycle_id")?);
    }
    Ok(ids)
}

fn parse_link_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Link> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("status")?;
    let status = LinkStatus::from_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid link status `{status_text}` in links.status"))
    })?;
    let last_assigned_cycle = row
        .get::<_, Option<String>>("last_assigned_cycle")?
        .map(|value| parse_uuid(&value, "links.last_assigned_cycle"))
        .transpose()?;

    Ok(Link {
        id: parse_uuid(&id_text, "links.id")?,
        title: row.get("title")?,
        url: row.get("url")?,
        status,
        discovered_at: row.get("discovered_at")?,
        assigned_cycles: load_membership(conn, &id_text)?,
        last_assigned_cycle,
    })
}
