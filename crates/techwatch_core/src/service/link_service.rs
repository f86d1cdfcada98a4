//! Minimal link catalog used to feed the allocator.

use crate::model::link::{Link, LinkId, LinkStatus};
use crate::repo::link_repo::{LinkRepository, NewLink};
use crate::repo::store::TechWatchStore;
use crate::service::error::{TechWatchError, TechWatchResult};
use log::info;

pub struct LinkService<S: TechWatchStore> {
    store: S,
}

impl<S: TechWatchStore> LinkService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Records a discovered link in `TO_PROCESS`.
    ///
    /// # Errors
    /// - `MissingField` for a blank title or url.
    /// - `DuplicateUrl` when the url is already known.
    pub fn create_link(&self, title: &str, url: &str) -> TechWatchResult<Link> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() {
            return Err(TechWatchError::MissingField("title"));
        }
        if url.is_empty() {
            return Err(TechWatchError::MissingField("url"));
        }

        let link = self.store.links().create_link(&NewLink {
            title: title.to_string(),
            url: url.to_string(),
        })?;
        info!("event=link_create module=service status=ok link_id={}", link.id);
        Ok(link)
    }

    pub fn get_link(&self, id: LinkId) -> TechWatchResult<Link> {
        self.store
            .links()
            .get_link(id)?
            .ok_or(TechWatchError::LinkNotFound(id))
    }

    pub fn find_link_by_url(&self, url: &str) -> TechWatchResult<Option<Link>> {
        Ok(self.store.links().find_link_by_url(url.trim())?)
    }

    /// Sets the triage status and returns the updated link.
    pub fn set_link_status(&self, id: LinkId, status: LinkStatus) -> TechWatchResult<Link> {
        self.store.atomically(|store| {
            store.links().set_link_status(id, status)?;
            store
                .links()
                .get_link(id)?
                .ok_or(TechWatchError::LinkNotFound(id))
        })
    }
}
