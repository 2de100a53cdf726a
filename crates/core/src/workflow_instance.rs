//! Workflow instance records and lifecycle action guards.
//!
//! A [`WorkflowInstance`] is owned by the backend; the client only ever
//! holds copies returned by the list endpoint. Which lifecycle actions the
//! console offers for a record is decided here, from the record alone, so
//! every surface (manager, operator commands, tests) applies the same
//! guards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{null_as_default, InstanceId, ProjectId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of an instance name, in characters.
pub const MAX_NAME_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Execution status as reported by the orchestration backend.
///
/// The backend vocabulary may grow; values the client does not know are
/// kept verbatim in [`InstanceStatus::Other`] and are display-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    #[default]
    Idle,
    Running,
    Stopped,
    Error,
    Other(String),
}

impl InstanceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<String> for InstanceStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "idle" => Self::Idle,
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "error" => Self::Error,
            _ => Self::Other(raw),
        }
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        match status {
            InstanceStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run mode / trigger
// ---------------------------------------------------------------------------

/// How an instance executes. Fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Single execution.
    #[default]
    Once,
    /// Long-lived; its trigger can be activated and deactivated.
    Persistent,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Persistent => "persistent",
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(Self::Once),
            "persistent" => Ok(Self::Persistent),
            other => Err(CoreError::Validation(format!(
                "Unknown run mode \"{other}\" (expected once or persistent)"
            ))),
        }
    }
}

/// What starts a run.
///
/// Like [`InstanceStatus`], trigger kinds the client does not know are kept
/// verbatim in [`TriggerType::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerType {
    #[default]
    Manual,
    Http,
    Cron,
    Other(String),
}

impl TriggerType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Manual => "manual",
            Self::Http => "http",
            Self::Cron => "cron",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for TriggerType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "manual" => Self::Manual,
            "http" => Self::Http,
            "cron" => Self::Cron,
            _ => Self::Other(raw),
        }
    }
}

impl From<TriggerType> for String {
    fn from(trigger: TriggerType) -> Self {
        match trigger {
            TriggerType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One workflow instance as last returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: InstanceId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: InstanceStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub run_mode: RunMode,
    #[serde(default)]
    pub trigger_type: Option<TriggerType>,
    /// Only meaningful for [`RunMode::Persistent`].
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    /// Node references; the console only consumes the count.
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<serde_json::Value>,
    #[serde(default)]
    pub last_run_at: Option<Timestamp>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl WorkflowInstance {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// `false` when the backend reports no previous run.
    pub fn has_run(&self) -> bool {
        self.last_run_at.is_some()
    }

    /// Whether the console offers `action` for this record.
    pub fn allows(&self, action: InstanceAction) -> bool {
        let persistent = self.run_mode == RunMode::Persistent;
        match action {
            InstanceAction::Start => !self.status.is_running(),
            InstanceAction::Stop => self.status.is_running(),
            InstanceAction::Sync | InstanceAction::Delete => true,
            InstanceAction::Activate => persistent && !self.is_active,
            InstanceAction::Deactivate => persistent && self.is_active,
        }
    }

    /// Every lifecycle action whose guard holds, in display order.
    pub fn available_actions(&self) -> Vec<InstanceAction> {
        InstanceAction::ALL
            .into_iter()
            .filter(|action| self.allows(*action))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Lifecycle actions on an existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceAction {
    Start,
    Stop,
    Sync,
    Activate,
    Deactivate,
    Delete,
}

impl InstanceAction {
    pub const ALL: [InstanceAction; 6] = [
        Self::Start,
        Self::Stop,
        Self::Sync,
        Self::Activate,
        Self::Deactivate,
        Self::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Sync => "sync",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for InstanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Request body for creating an empty instance.
///
/// Instances are always created without nodes or edges; the graph is
/// authored elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInstance {
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    pub run_mode: RunMode,
    pub trigger_type: TriggerType,
    pub trigger_enabled: bool,
    pub nodes: Vec<serde_json::Value>,
    pub edges: Vec<serde_json::Value>,
}

impl NewInstance {
    pub fn new(project_id: impl Into<ProjectId>, name: impl Into<String>, run_mode: RunMode) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            description: String::new(),
            run_mode,
            trigger_type: TriggerType::Manual,
            trigger_enabled: false,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_trigger(mut self, trigger_type: TriggerType, enabled: bool) -> Self {
        self.trigger_type = trigger_type;
        self.trigger_enabled = enabled;
        self
    }

    /// Check the request and normalise the name (surrounding whitespace
    /// is trimmed).
    pub fn validate(&mut self) -> Result<(), CoreError> {
        validate_instance_name(&self.name)?;
        self.name = self.name.trim().to_string();
        Ok(())
    }
}

/// Validate an instance name.
///
/// Rules:
/// - Must not be empty or whitespace-only.
/// - Must not exceed [`MAX_NAME_LEN`] characters once trimmed.
pub fn validate_instance_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Instance name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Instance name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
