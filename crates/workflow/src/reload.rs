//! Full reloads of the displayed page.
//!
//! Both the poller and the transition controller refresh through a shared
//! [`Reloader`]. A reload issues a sequenced ticket, fetches the page
//! without holding the view lock, and applies the response only if the
//! ticket is still the newest one and the view is still mounted.

use std::sync::Arc;

use opsdeck_client::{ApiError, InstanceBackend, InstanceQuery};
use opsdeck_core::types::ProjectId;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::events::{self, InstanceEvent};
use crate::view::{ApplyOutcome, InstanceView};

/// What happened to a reload that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The response is now displayed.
    Applied { page: u32, total: u64 },
    /// A newer reload superseded this one; its response was dropped.
    Stale,
    /// The view was torn down; nothing was applied.
    Cancelled,
}

/// Shared handle that reloads the current page of one project.
#[derive(Clone)]
pub struct Reloader {
    backend: Arc<dyn InstanceBackend>,
    view: Arc<RwLock<InstanceView>>,
    project_id: ProjectId,
    events: broadcast::Sender<InstanceEvent>,
    cancel: CancellationToken,
}

impl Reloader {
    pub fn new(
        backend: Arc<dyn InstanceBackend>,
        view: Arc<RwLock<InstanceView>>,
        project_id: ProjectId,
        events: broadcast::Sender<InstanceEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            view,
            project_id,
            events,
            cancel,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Reload the current page.
    ///
    /// If the response shows the page has fallen past the end of the list,
    /// one follow-up reload fetches the clamped page. On failure the
    /// displayed page is left as it was.
    pub async fn reload(&self) -> Result<ReloadOutcome, ApiError> {
        let (outcome, out_of_range) = self.reload_once().await?;
        if out_of_range {
            tracing::debug!(
                project_id = %self.project_id,
                "Page out of range after reload, fetching clamped page",
            );
            return Ok(self.reload_once().await?.0);
        }
        Ok(outcome)
    }

    async fn reload_once(&self) -> Result<(ReloadOutcome, bool), ApiError> {
        let ticket = {
            let mut view = self.view.write().await;
            if self.cancel.is_cancelled() {
                return Ok((ReloadOutcome::Cancelled, false));
            }
            view.issue_reload()
        };

        let query = InstanceQuery {
            project_id: self.project_id.clone(),
            page: ticket.page(),
            page_size: ticket.page_size(),
        };

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Ok((ReloadOutcome::Cancelled, false)),
            result = self.backend.list_instances(&query) => result,
        };

        let mut view = self.view.write().await;
        if self.cancel.is_cancelled() {
            return Ok((ReloadOutcome::Cancelled, false));
        }

        let page = match result {
            Ok(page) => page,
            Err(e) if !view.store().is_current(&ticket) => {
                tracing::debug!(seq = ticket.seq(), error = %e, "Dropping failure of superseded reload");
                return Ok((ReloadOutcome::Stale, false));
            }
            Err(e) => {
                tracing::warn!(
                    project_id = %self.project_id,
                    page = ticket.page(),
                    error = %e,
                    "Instance reload failed, keeping previous page",
                );
                events::publish(
                    &self.events,
                    InstanceEvent::ReloadFailed {
                        error: e.to_string(),
                    },
                );
                return Err(e);
            }
        };

        let total = page.total;
        match view.apply(&ticket, page.items, total) {
            ApplyOutcome::Stale => {
                tracing::debug!(seq = ticket.seq(), "Dropping superseded reload response");
                Ok((ReloadOutcome::Stale, false))
            }
            ApplyOutcome::Applied { out_of_range } => {
                tracing::debug!(
                    seq = ticket.seq(),
                    page = ticket.page(),
                    total,
                    "Instance page reloaded",
                );
                events::publish(
                    &self.events,
                    InstanceEvent::ReloadApplied {
                        page: ticket.page(),
                        total,
                    },
                );
                Ok((
                    ReloadOutcome::Applied {
                        page: ticket.page(),
                        total,
                    },
                    out_of_range,
                ))
            }
        }
    }
}
