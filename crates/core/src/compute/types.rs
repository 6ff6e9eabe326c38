//! Types for the compute provider abstraction.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::launcher::BootConfig;

/// Tag holding a human-readable instance name.
pub const TAG_NAME: &str = "Name";
/// Tag marking what the instance is for; used to discover our own instances.
pub const TAG_PURPOSE: &str = "Purpose";
/// Tag holding the group the instance was launched for.
pub const TAG_GROUP: &str = "Group";
/// Tag holding the item a worker was launched for.
pub const TAG_ITEM: &str = "Item";

/// Errors from compute provider operations.
#[derive(Debug, Clone, Error)]
pub enum ComputeError {
    /// The provider refused to create the instance.
    #[error("instance launch rejected: {0}")]
    LaunchRejected(String),

    /// Instance not known to the provider.
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// The instance did not reach the running state.
    #[error("instance {id} did not reach running state: {reason}")]
    NotRunning { id: String, reason: String },

    /// Provider API failure.
    #[error("compute provider error: {0}")]
    Provider(String),
}

/// Opaque instance identifier assigned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-owned lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Terminated,
}

impl InstanceState {
    /// Pending and running instances occupy a worker slot.
    pub fn is_active(&self) -> bool {
        matches!(self, InstanceState::Pending | InstanceState::Running)
    }
}

/// What an instance is launched to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceRole {
    Worker,
    Controller,
}

impl InstanceRole {
    /// Value of the `Purpose` tag for this role.
    pub fn purpose(&self) -> &'static str {
        match self {
            InstanceRole::Worker => "scrapefleet-worker",
            InstanceRole::Controller => "scrapefleet-controller",
        }
    }
}

/// Instance tags, ordered for stable output.
pub type Tags = BTreeMap<String, String>;

/// A compute instance as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInstance {
    pub id: InstanceId,
    pub state: InstanceState,
    pub tags: Tags,
    pub launched_at: DateTime<Utc>,
}

impl WorkerInstance {
    /// Value of a tag, if set.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Everything the provider needs to create one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Instance size requested from the provider.
    pub instance_type: String,
    /// Structured boot configuration handed to the instance.
    pub boot: BootConfig,
    /// Tags applied at creation.
    pub tags: Tags,
}

impl LaunchSpec {
    pub fn role(&self) -> InstanceRole {
        self.boot.role
    }
}

/// Filter for listing instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    /// Accepted lifecycle states (empty = any state).
    pub states: Vec<InstanceState>,
    /// Tags that must be present with exactly these values.
    pub tags: Tags,
}

impl InstanceFilter {
    /// Create an empty filter matching every instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only pending and running instances.
    pub fn active(mut self) -> Self {
        self.states = vec![InstanceState::Pending, InstanceState::Running];
        self
    }

    /// Require a tag value.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Whether an instance passes this filter.
    pub fn matches(&self, instance: &WorkerInstance) -> bool {
        let state_ok = self.states.is_empty() || self.states.contains(&instance.state);
        let tags_ok = self
            .tags
            .iter()
            .all(|(k, v)| instance.tag(k) == Some(v.as_str()));
        state_ok && tags_ok
    }
}

/// Instance lifecycle API of the compute provider.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Request creation of one instance.
    async fn run_instance(&self, spec: &LaunchSpec) -> Result<InstanceId, ComputeError>;

    /// Block until the instance is running.
    async fn wait_until_running(&self, id: &InstanceId) -> Result<(), ComputeError>;

    /// List instances matching the filter.
    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<WorkerInstance>, ComputeError>;

    /// Request termination of the given instances.
    async fn terminate_instances(&self, ids: &[InstanceId]) -> Result<(), ComputeError>;

    /// Identity of the instance this process runs on, if any.
    async fn current_instance_id(&self) -> Option<InstanceId>;
}
