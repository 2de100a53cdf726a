//! Lifecycle commands against the backend.
//!
//! Each operation performs exactly one action and, once the backend has
//! accepted it, reloads the current page. Acceptance is all the client
//! learns: a started instance shows up as running only when a later reload
//! says so. Nothing is patched into the store locally.
//!
//! Guards on start/stop/activate/deactivate are evaluated against the
//! cached record before any network call; a guard that does not hold means
//! the affordance does not exist and the command is refused client-side.
//! A precondition the backend rejects is an ordinary failure.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use opsdeck_client::{ApiError, InstanceBackend};
use opsdeck_core::error::CoreError;
use opsdeck_core::types::{InstanceId, ProjectId};
use opsdeck_core::workflow_instance::{InstanceAction, NewInstance, RunMode, WorkflowInstance};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::events::{self, InstanceEvent};
use crate::reload::Reloader;
use crate::view::InstanceView;

const ACTION_CREATE: &str = "create";
const ACTION_BATCH_DELETE: &str = "batch_delete";

/// Errors returned by [`TransitionController`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Invalid input, or the instance is not on the displayed page.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The action's guard does not hold for the cached record.
    #[error("Cannot {action} instance {instance_id} in its current state")]
    NotPermitted {
        action: InstanceAction,
        instance_id: InstanceId,
    },

    /// Batch delete with nothing selected.
    #[error("No instances selected")]
    EmptySelection,

    /// The backend call failed (transport, rejection, or server fault).
    #[error("Failed to {action}: {source}")]
    Backend {
        action: &'static str,
        source: ApiError,
    },

    /// The owning view has been torn down.
    #[error("Instance view is no longer mounted")]
    Unmounted,
}

/// One delete of a batch that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub instance_id: InstanceId,
    pub error: String,
}

/// Outcome of a batch delete after every delete has been attempted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchDeleteReport {
    pub deleted: Vec<InstanceId>,
    pub failed: Vec<BatchFailure>,
}

impl BatchDeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<InstanceId> {
        self.failed.iter().map(|f| f.instance_id.clone()).collect()
    }
}

/// Issues lifecycle commands for one project's instance view.
#[derive(Clone)]
pub struct TransitionController {
    backend: Arc<dyn InstanceBackend>,
    view: Arc<RwLock<InstanceView>>,
    reloader: Reloader,
    events: broadcast::Sender<InstanceEvent>,
    cancel: CancellationToken,
    project_id: ProjectId,
    /// Upper bound on concurrent deletes in a batch; `None` fans out to
    /// every selected id at once.
    batch_concurrency: Option<usize>,
}

impl TransitionController {
    pub fn new(
        backend: Arc<dyn InstanceBackend>,
        view: Arc<RwLock<InstanceView>>,
        reloader: Reloader,
        events: broadcast::Sender<InstanceEvent>,
        cancel: CancellationToken,
        batch_concurrency: Option<usize>,
    ) -> Self {
        let project_id = reloader.project_id().to_string();
        Self {
            backend,
            view,
            reloader,
            events,
            cancel,
            project_id,
            batch_concurrency,
        }
    }

    /// Create an empty instance (no nodes, no edges) in this project.
    pub async fn create(&self, name: &str, run_mode: RunMode) -> Result<WorkflowInstance, ActionError> {
        self.create_instance(NewInstance::new(self.project_id.clone(), name, run_mode))
            .await
    }

    /// Create an instance from a fully specified request. The request's
    /// project is replaced by this view's project.
    pub async fn create_instance(
        &self,
        mut request: NewInstance,
    ) -> Result<WorkflowInstance, ActionError> {
        self.ensure_mounted()?;
        request.project_id = self.project_id.clone();
        if let Err(e) = request.validate() {
            self.report_failure(ACTION_CREATE, None, &e.to_string());
            return Err(e.into());
        }
        // The graph is authored elsewhere.
        request.nodes.clear();
        request.edges.clear();

        let created = match self.backend.create_instance(&request).await {
            Ok(created) => created,
            Err(e) => {
                self.report_failure(ACTION_CREATE, None, &e.to_string());
                return Err(ActionError::Backend {
                    action: ACTION_CREATE,
                    source: e,
                });
            }
        };

        tracing::info!(
            project_id = %self.project_id,
            instance_id = %created.id,
            name = %created.name,
            run_mode = created.run_mode.as_str(),
            "Workflow instance created",
        );
        events::publish(
            &self.events,
            InstanceEvent::InstanceCreated {
                instance_id: created.id.clone(),
                name: created.name.clone(),
            },
        );

        self.refresh().await;
        Ok(created)
    }

    pub async fn start(&self, id: &str) -> Result<(), ActionError> {
        self.guarded(InstanceAction::Start, id).await
    }

    pub async fn stop(&self, id: &str) -> Result<(), ActionError> {
        self.guarded(InstanceAction::Stop, id).await
    }

    pub async fn activate(&self, id: &str) -> Result<(), ActionError> {
        self.guarded(InstanceAction::Activate, id).await
    }

    pub async fn deactivate(&self, id: &str) -> Result<(), ActionError> {
        self.guarded(InstanceAction::Deactivate, id).await
    }

    /// Have the backend re-pull the instance's status from the
    /// orchestrator, then reload.
    pub async fn sync(&self, id: &str) -> Result<(), ActionError> {
        self.ensure_mounted()?;
        self.perform(InstanceAction::Sync, id).await
    }

    /// Delete one instance and drop it from the selection.
    pub async fn delete(&self, id: &str) -> Result<(), ActionError> {
        self.ensure_mounted()?;
        self.perform(InstanceAction::Delete, id).await
    }

    /// Run any lifecycle action, applying its guard where it has one.
    pub async fn execute(&self, action: InstanceAction, id: &str) -> Result<(), ActionError> {
        match action {
            InstanceAction::Sync | InstanceAction::Delete => {
                self.ensure_mounted()?;
                self.perform(action, id).await
            }
            guarded => self.guarded(guarded, id).await,
        }
    }

    /// Delete every selected instance.
    ///
    /// All deletes are issued concurrently (bounded by the configured batch
    /// concurrency, if any) and every one is attempted regardless of the
    /// others failing. The page is reloaded afterwards in all cases so it
    /// reflects whichever deletes went through.
    pub async fn batch_delete(&self) -> Result<BatchDeleteReport, ActionError> {
        self.ensure_mounted()?;
        let ids = self.view.read().await.selection().selected();
        if ids.is_empty() {
            self.report_failure(ACTION_BATCH_DELETE, None, "No instances selected");
            return Err(ActionError::EmptySelection);
        }

        tracing::info!(
            project_id = %self.project_id,
            count = ids.len(),
            concurrency = ?self.batch_concurrency,
            "Deleting selected instances",
        );

        let backend = &self.backend;
        let attempts = ids.iter().map(|id| async move {
            let result = backend.delete_instance(id).await;
            (id.clone(), result)
        });
        let results: Vec<(InstanceId, Result<(), ApiError>)> = match self.batch_concurrency {
            None => futures::future::join_all(attempts).await,
            Some(limit) => {
                stream::iter(attempts)
                    .buffer_unordered(limit.max(1))
                    .collect()
                    .await
            }
        };

        let mut report = BatchDeleteReport::default();
        for (id, result) in results {
            match result {
                Ok(()) => report.deleted.push(id),
                Err(e) => {
                    tracing::warn!(instance_id = %id, error = %e, "Delete in batch failed");
                    report.failed.push(BatchFailure {
                        instance_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.deleted.sort();
        report.failed.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));

        if !self.cancel.is_cancelled() {
            let mut view = self.view.write().await;
            for id in &report.deleted {
                view.selection_mut().remove(id);
            }
        }

        events::publish(
            &self.events,
            InstanceEvent::BatchDeleteFinished {
                deleted: report.deleted.clone(),
                failed: report.failed_ids(),
            },
        );
        if !report.is_complete() {
            self.report_failure(
                ACTION_BATCH_DELETE,
                None,
                &format!(
                    "{} of {} deletes failed: {}",
                    report.failed.len(),
                    ids.len(),
                    report.failed_ids().join(", "),
                ),
            );
        }

        self.refresh().await;
        Ok(report)
    }

    // ---- private helpers ----

    fn ensure_mounted(&self) -> Result<(), ActionError> {
        if self.cancel.is_cancelled() {
            return Err(ActionError::Unmounted);
        }
        Ok(())
    }

    /// Check `action`'s guard against the cached record, then perform it.
    async fn guarded(&self, action: InstanceAction, id: &str) -> Result<(), ActionError> {
        self.ensure_mounted()?;

        let refusal = {
            let view = self.view.read().await;
            match view.store().get(id) {
                None => Some(ActionError::Core(CoreError::NotFound {
                    entity: "workflow instance",
                    id: id.to_string(),
                })),
                Some(record) if !record.allows(action) => Some(ActionError::NotPermitted {
                    action,
                    instance_id: id.to_string(),
                }),
                Some(_) => None,
            }
        };

        if let Some(err) = refusal {
            tracing::debug!(instance_id = %id, action = action.as_str(), error = %err, "Action refused");
            self.report_failure(action.as_str(), Some(id), &err.to_string());
            return Err(err);
        }

        self.perform(action, id).await
    }

    /// Send the command, then reload on acceptance.
    async fn perform(&self, action: InstanceAction, id: &str) -> Result<(), ActionError> {
        if let Err(e) = self.backend.perform(action, id).await {
            tracing::warn!(
                instance_id = %id,
                action = action.as_str(),
                error = %e,
                "Instance action failed",
            );
            self.report_failure(action.as_str(), Some(id), &e.to_string());
            return Err(ActionError::Backend {
                action: action.as_str(),
                source: e,
            });
        }

        tracing::info!(instance_id = %id, action = action.as_str(), "Instance action accepted");
        events::publish(
            &self.events,
            InstanceEvent::ActionAccepted {
                action: action.as_str(),
                instance_id: id.to_string(),
            },
        );

        if action == InstanceAction::Delete && !self.cancel.is_cancelled() {
            self.view.write().await.selection_mut().remove(id);
        }

        self.refresh().await;
        Ok(())
    }

    /// Reload after a successful command. A failed reload does not undo
    /// the command's success; the reloader has already reported it.
    async fn refresh(&self) {
        if let Err(e) = self.reloader.reload().await {
            tracing::debug!(error = %e, "Reload after action failed");
        }
    }

    fn report_failure(&self, action: &'static str, instance_id: Option<&str>, error: &str) {
        events::publish(
            &self.events,
            InstanceEvent::ActionFailed {
                action,
                instance_id: instance_id.map(str::to_string),
                error: error.to_string(),
            },
        );
    }
}
