//! The backend seam used by the instance manager.

use async_trait::async_trait;
use opsdeck_core::workflow_instance::{InstanceAction, NewInstance, WorkflowInstance};

use crate::api::{ApiError, ConsoleApi, InstancePage, InstanceQuery};

/// Operations the instance manager needs from the console backend.
///
/// Every lifecycle command resolves to an acknowledgement only: success
/// means the backend accepted the request, not that the transition has
/// finished.
#[async_trait]
pub trait InstanceBackend: Send + Sync {
    async fn list_instances(&self, query: &InstanceQuery) -> Result<InstancePage, ApiError>;

    async fn create_instance(&self, body: &NewInstance) -> Result<WorkflowInstance, ApiError>;

    async fn start_instance(&self, id: &str) -> Result<(), ApiError>;

    async fn stop_instance(&self, id: &str) -> Result<(), ApiError>;

    async fn sync_instance_status(&self, id: &str) -> Result<(), ApiError>;

    async fn activate_instance(&self, id: &str) -> Result<(), ApiError>;

    async fn deactivate_instance(&self, id: &str) -> Result<(), ApiError>;

    async fn delete_instance(&self, id: &str) -> Result<(), ApiError>;

    /// Dispatch `action` to the matching command.
    async fn perform(&self, action: InstanceAction, id: &str) -> Result<(), ApiError> {
        match action {
            InstanceAction::Start => self.start_instance(id).await,
            InstanceAction::Stop => self.stop_instance(id).await,
            InstanceAction::Sync => self.sync_instance_status(id).await,
            InstanceAction::Activate => self.activate_instance(id).await,
            InstanceAction::Deactivate => self.deactivate_instance(id).await,
            InstanceAction::Delete => self.delete_instance(id).await,
        }
    }
}

#[async_trait]
impl InstanceBackend for ConsoleApi {
    async fn list_instances(&self, query: &InstanceQuery) -> Result<InstancePage, ApiError> {
        ConsoleApi::list_instances(self, query).await
    }

    async fn create_instance(&self, body: &NewInstance) -> Result<WorkflowInstance, ApiError> {
        ConsoleApi::create_instance(self, body).await
    }

    async fn start_instance(&self, id: &str) -> Result<(), ApiError> {
        ConsoleApi::start_instance(self, id).await
    }

    async fn stop_instance(&self, id: &str) -> Result<(), ApiError> {
        ConsoleApi::stop_instance(self, id).await
    }

    async fn sync_instance_status(&self, id: &str) -> Result<(), ApiError> {
        ConsoleApi::sync_instance_status(self, id).await
    }

    async fn activate_instance(&self, id: &str) -> Result<(), ApiError> {
        ConsoleApi::activate_instance(self, id).await
    }

    async fn deactivate_instance(&self, id: &str) -> Result<(), ApiError> {
        ConsoleApi::deactivate_instance(self, id).await
    }

    async fn delete_instance(&self, id: &str) -> Result<(), ApiError> {
        ConsoleApi::delete_instance(self, id).await
    }
}
