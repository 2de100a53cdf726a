//! Per-project instance manager.
//!
//! [`InstanceManager`] mounts the instance view for one project: it loads
//! the first page, spawns the poll loop, and exposes the transition
//! controller and selection operations. [`InstanceManager::teardown`]
//! stops everything; after it returns no response, in flight or not, can
//! touch the view again.

use std::sync::Arc;
use std::time::Duration;

use opsdeck_client::{ApiError, InstanceBackend};
use opsdeck_core::error::CoreError;
use opsdeck_core::pagination::{validate_page_size, PageWindow, DEFAULT_PAGE_SIZE};
use opsdeck_core::types::ProjectId;
use opsdeck_core::workflow_instance::WorkflowInstance;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::controller::{ActionError, TransitionController};
use crate::events::{self, InstanceEvent};
use crate::poller::{self, DEFAULT_POLL_INTERVAL};
use crate::reload::{ReloadOutcome, Reloader};
use crate::view::{InstanceView, ViewSnapshot};

/// How long teardown waits for the poll task to exit.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for one mounted instance view.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Project whose instances are listed; the list filter.
    pub project_id: ProjectId,
    pub page_size: u32,
    pub poll_interval: Duration,
    /// Cap on concurrent deletes in a batch; `None` means unbounded.
    pub batch_concurrency: Option<usize>,
}

impl ManagerConfig {
    pub fn new(project_id: impl Into<ProjectId>) -> Self {
        Self {
            project_id: project_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_concurrency: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.project_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "A project must be selected".to_string(),
            ));
        }
        validate_page_size(self.page_size)?;
        if self.poll_interval.is_zero() {
            return Err(CoreError::Validation(
                "Poll interval must be greater than zero".to_string(),
            ));
        }
        if self.batch_concurrency == Some(0) {
            return Err(CoreError::Validation(
                "Batch concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The mounted instance view of one project.
pub struct InstanceManager {
    view: Arc<RwLock<InstanceView>>,
    reloader: Reloader,
    controller: TransitionController,
    event_tx: broadcast::Sender<InstanceEvent>,
    /// Mount token; cancelled exactly once, by teardown.
    cancel: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl InstanceManager {
    /// Load the first page and start polling.
    ///
    /// A failed initial load is reported but does not fail the mount; the
    /// poller keeps trying on its schedule.
    pub async fn mount(
        backend: Arc<dyn InstanceBackend>,
        config: ManagerConfig,
    ) -> Result<Arc<Self>, CoreError> {
        config.validate()?;

        let window = PageWindow::new(config.page_size)?;
        let view = Arc::new(RwLock::new(InstanceView::new(window)));
        let event_tx = events::channel();
        let cancel = CancellationToken::new();

        let reloader = Reloader::new(
            Arc::clone(&backend),
            Arc::clone(&view),
            config.project_id.clone(),
            event_tx.clone(),
            cancel.clone(),
        );
        let controller = TransitionController::new(
            backend,
            Arc::clone(&view),
            reloader.clone(),
            event_tx.clone(),
            cancel.clone(),
            config.batch_concurrency,
        );

        tracing::info!(
            project_id = %config.project_id,
            page_size = config.page_size,
            poll_interval_ms = u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "Mounting instance view",
        );

        if let Err(e) = reloader.reload().await {
            tracing::warn!(project_id = %config.project_id, error = %e, "Initial instance load failed");
        }

        let poll_reloader = reloader.clone();
        let poll_cancel = cancel.clone();
        let period = config.poll_interval;
        let handle = tokio::spawn(async move {
            poller::run(poll_reloader, period, poll_cancel).await;
        });

        Ok(Arc::new(Self {
            view,
            reloader,
            controller,
            event_tx,
            cancel,
            poller: Mutex::new(Some(handle)),
        }))
    }

    /// Subscribe to notifications from this view.
    pub fn subscribe(&self) -> broadcast::Receiver<InstanceEvent> {
        self.event_tx.subscribe()
    }

    /// Lifecycle commands for this view.
    pub fn controller(&self) -> &TransitionController {
        &self.controller
    }

    pub fn is_mounted(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Reload the current page now, outside the poll schedule.
    pub async fn reload(&self) -> Result<ReloadOutcome, ApiError> {
        self.reloader.reload().await
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        self.view.read().await.snapshot()
    }

    pub async fn get(&self, id: &str) -> Option<WorkflowInstance> {
        self.view.read().await.store().get(id).cloned()
    }

    /// Flip the checkbox of an instance on the displayed page.
    pub async fn toggle(&self, id: &str) -> bool {
        if !self.is_mounted() {
            return false;
        }
        self.view.write().await.selection_mut().toggle(id)
    }

    /// Select every instance on the displayed page.
    pub async fn select_all(&self) -> usize {
        if !self.is_mounted() {
            return 0;
        }
        self.view.write().await.selection_mut().select_all()
    }

    pub async fn clear_selection(&self) {
        if self.is_mounted() {
            self.view.write().await.selection_mut().clear();
        }
    }

    /// Move to another page and load it. The selection is cleared.
    pub async fn set_page(&self, page: u32) -> Result<ReloadOutcome, ActionError> {
        if !self.is_mounted() {
            return Err(ActionError::Unmounted);
        }
        self.view.write().await.set_page(page);
        self.reload_for("change page").await
    }

    /// Change the page size, go back to page 1, and load it.
    pub async fn set_page_size(&self, page_size: u32) -> Result<ReloadOutcome, ActionError> {
        if !self.is_mounted() {
            return Err(ActionError::Unmounted);
        }
        self.view.write().await.set_page_size(page_size)?;
        self.reload_for("change page size").await
    }

    /// Stop polling and detach the view.
    ///
    /// Cancels the mount token, then waits up to 5 seconds for the poll
    /// task to exit. Idempotent.
    pub async fn teardown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::info!(project_id = %self.reloader.project_id(), "Tearing down instance view");
        self.cancel.cancel();

        // Taking the write lock waits out any response being applied right
        // now; everything after this sees the cancelled token.
        drop(self.view.write().await);

        if let Some(handle) = self.poller.lock().await.take() {
            if tokio::time::timeout(TEARDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Instance poller did not stop within timeout");
            }
        }
    }

    async fn reload_for(&self, action: &'static str) -> Result<ReloadOutcome, ActionError> {
        self.reloader
            .reload()
            .await
            .map_err(|source| ActionError::Backend { action, source })
    }
}

impl Drop for InstanceManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
