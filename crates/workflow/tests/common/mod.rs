//! In-memory stand-in for the console backend.
//!
//! Holds a list of instances and applies lifecycle commands to it the way
//! the real service would (asynchronously from the client's point of view:
//! a start moves the instance to `scheduling`, not `running`). Individual
//! list calls can be made to fail or to block until released, which the
//! ordering and polling tests rely on.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use opsdeck_client::{ApiError, InstanceBackend, InstancePage, InstanceQuery};
use opsdeck_core::workflow_instance::{
    InstanceAction, InstanceStatus, NewInstance, RunMode, WorkflowInstance,
};
use opsdeck_workflow::{InstanceManager, ManagerConfig};
use tokio::sync::Notify;

pub const PROJECT: &str = "proj-1";

/// Status the fake reports right after accepting a start.
pub const STARTED_STATUS: &str = "scheduling";

#[derive(Default)]
pub struct FakeState {
    pub instances: Vec<WorkflowInstance>,
    pub list_queries: Vec<InstanceQuery>,
    pub commands: Vec<(InstanceAction, String)>,
    pub created: Vec<NewInstance>,
    /// 1-based list call numbers that fail with a transport error.
    pub fail_list_calls: HashSet<usize>,
    pub fail_deletes: HashSet<String>,
    pub next_id: usize,
}

#[derive(Default)]
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
    gates: Mutex<HashMap<usize, Arc<Notify>>>,
}

impl FakeBackend {
    pub fn with_instances(instances: Vec<WorkflowInstance>) -> Arc<Self> {
        let backend = Self::default();
        backend.state.lock().unwrap().instances = instances;
        Arc::new(backend)
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_queries.len()
    }

    pub fn last_query(&self) -> Option<InstanceQuery> {
        self.state.lock().unwrap().list_queries.last().cloned()
    }

    pub fn commands(&self) -> Vec<(InstanceAction, String)> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .instances
            .iter()
            .map(|i| i.id.clone())
            .collect()
    }

    /// Make list call number `call` (1-based) block until the returned
    /// handle is notified. The page it returns is captured when the call
    /// arrives, as a slow server would.
    pub fn hold_list_call(&self, call: usize) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(call, Arc::clone(&gate));
        gate
    }

    /// Change server-side state without going through the client.
    pub fn mutate(&self, f: impl FnOnce(&mut Vec<WorkflowInstance>)) {
        f(&mut self.state.lock().unwrap().instances);
    }

    fn not_found(id: &str) -> ApiError {
        ApiError::Rejected {
            status: 404,
            message: format!("instance {id} not found"),
        }
    }

    fn command(
        &self,
        action: InstanceAction,
        id: &str,
        apply: impl FnOnce(&mut WorkflowInstance) -> Result<(), ApiError>,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.commands.push((action, id.to_string()));
        let record = state
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        apply(record)
    }
}

#[async_trait]
impl InstanceBackend for FakeBackend {
    async fn list_instances(&self, query: &InstanceQuery) -> Result<InstancePage, ApiError> {
        let (call, result) = {
            let mut state = self.state.lock().unwrap();
            state.list_queries.push(query.clone());
            let call = state.list_queries.len();

            let result = if state.fail_list_calls.contains(&call) {
                Err(ApiError::Transport("connection refused".to_string()))
            } else {
                let size = query.page_size as usize;
                let start = (query.page.max(1) as usize - 1) * size;
                Ok(InstancePage {
                    items: state.instances.iter().skip(start).take(size).cloned().collect(),
                    total: state.instances.len() as u64,
                })
            };
            (call, result)
        };

        let gate = self.gates.lock().unwrap().remove(&call);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }

    async fn create_instance(&self, body: &NewInstance) -> Result<WorkflowInstance, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.created.push(body.clone());
        state.next_id += 1;
        let mut record = instance(&format!("wf-new-{}", state.next_id), InstanceStatus::Idle, body.run_mode, false);
        record.name = body.name.clone();
        state.instances.push(record.clone());
        Ok(record)
    }

    async fn start_instance(&self, id: &str) -> Result<(), ApiError> {
        self.command(InstanceAction::Start, id, |record| {
            if record.status.is_running() {
                return Err(ApiError::Rejected {
                    status: 409,
                    message: "instance is already running".to_string(),
                });
            }
            record.status = InstanceStatus::Other(STARTED_STATUS.to_string());
            Ok(())
        })
    }

    async fn stop_instance(&self, id: &str) -> Result<(), ApiError> {
        self.command(InstanceAction::Stop, id, |record| {
            record.status = InstanceStatus::Stopped;
            Ok(())
        })
    }

    async fn sync_instance_status(&self, id: &str) -> Result<(), ApiError> {
        self.command(InstanceAction::Sync, id, |_| Ok(()))
    }

    async fn activate_instance(&self, id: &str) -> Result<(), ApiError> {
        self.command(InstanceAction::Activate, id, |record| {
            record.is_active = true;
            Ok(())
        })
    }

    async fn deactivate_instance(&self, id: &str) -> Result<(), ApiError> {
        self.command(InstanceAction::Deactivate, id, |record| {
            record.is_active = false;
            Ok(())
        })
    }

    async fn delete_instance(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.commands.push((InstanceAction::Delete, id.to_string()));
        if state.fail_deletes.contains(id) {
            return Err(ApiError::Server {
                status: 500,
                message: "delete failed".to_string(),
            });
        }
        let before = state.instances.len();
        state.instances.retain(|i| i.id != id);
        if state.instances.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

pub fn instance(id: &str, status: InstanceStatus, run_mode: RunMode, is_active: bool) -> WorkflowInstance {
    WorkflowInstance {
        id: id.to_string(),
        name: format!("instance {id}"),
        description: None,
        status,
        run_mode,
        trigger_type: None,
        is_active,
        nodes: Vec::new(),
        last_run_at: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn idle(id: &str) -> WorkflowInstance {
    instance(id, InstanceStatus::Idle, RunMode::Once, false)
}

/// Config that never polls during a test unless the test advances time.
pub fn quiet_config() -> ManagerConfig {
    ManagerConfig {
        poll_interval: Duration::from_secs(3600),
        ..ManagerConfig::new(PROJECT)
    }
}

pub async fn mount(backend: &Arc<FakeBackend>, config: ManagerConfig) -> Arc<InstanceManager> {
    InstanceManager::mount(Arc::clone(backend) as Arc<dyn InstanceBackend>, config)
        .await
        .expect("mount should succeed")
}

/// Ids on the manager's displayed page.
pub async fn page_ids(manager: &InstanceManager) -> Vec<String> {
    manager
        .snapshot()
        .await
        .records
        .into_iter()
        .map(|row| row.instance.id)
        .collect()
}
