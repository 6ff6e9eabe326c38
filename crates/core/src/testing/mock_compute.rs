//! Mock compute provider for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::compute::{
    ComputeError, ComputeProvider, InstanceFilter, InstanceId, InstanceState, LaunchSpec, Tags,
    WorkerInstance,
};
use crate::status::{ItemStatus, StatusStore};

/// A recorded run_instance call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedLaunch {
    /// Id assigned to the instance.
    pub id: InstanceId,
    /// The spec that was requested.
    pub spec: LaunchSpec,
    /// When the request was made.
    pub timestamp: DateTime<Utc>,
}

/// Mock implementation of the ComputeProvider trait.
///
/// Provides controllable behavior for testing:
/// - Launched instances appear as running and are listed by describe
/// - Recorded launches, waits and terminations for assertions
/// - Per-item launch failures and one-shot describe/terminate failures
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockComputeProvider::new().with_own_id("i-controller");
///
/// provider.fail_launch_for("London", ComputeError::LaunchRejected("capacity".into())).await;
/// provider.add_instance("i-1", InstanceState::Running, tags).await;
///
/// // ... run the code under test ...
///
/// assert_eq!(provider.launches().await.len(), 1);
/// assert_eq!(provider.terminations().await.len(), 1);
/// ```
pub struct MockComputeProvider {
    /// Known instances in creation order.
    instances: Arc<RwLock<Vec<WorkerInstance>>>,
    /// Recorded run_instance calls.
    launches: Arc<RwLock<Vec<RecordedLaunch>>>,
    /// Recorded terminate_instances calls.
    terminations: Arc<RwLock<Vec<Vec<InstanceId>>>>,
    /// Number of wait_until_running calls.
    wait_calls: Arc<RwLock<usize>>,
    /// Launch failures keyed by item tag.
    launch_failures: Arc<RwLock<HashMap<String, ComputeError>>>,
    /// Describe calls to let through before failing, and the error to fail with.
    describe_failure: Arc<RwLock<Option<(usize, ComputeError)>>>,
    /// If set, the next wait_until_running call fails with this error.
    next_wait_error: Arc<RwLock<Option<ComputeError>>>,
    /// If set, the next terminate_instances call fails with this error.
    next_terminate_error: Arc<RwLock<Option<ComputeError>>>,
    /// Return every instance from describe, ignoring the filter.
    ignore_filters: Arc<RwLock<bool>>,
    /// Store consulted at launch time to record the item's status.
    status_probe: Arc<RwLock<Option<Arc<dyn StatusStore>>>>,
    /// Statuses seen by the probe, one per launch.
    observed: Arc<RwLock<Vec<(String, Option<ItemStatus>)>>>,
    /// Counter for generating unique ids.
    id_counter: Arc<RwLock<u32>>,
    /// Identity returned by current_instance_id.
    own_id: Option<InstanceId>,
}

impl Default for MockComputeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockComputeProvider {
    /// Create a new mock provider with no instances and no identity.
    pub fn new() -> Self {
        Self {
            instances: Arc::new(RwLock::new(Vec::new())),
            launches: Arc::new(RwLock::new(Vec::new())),
            terminations: Arc::new(RwLock::new(Vec::new())),
            wait_calls: Arc::new(RwLock::new(0)),
            launch_failures: Arc::new(RwLock::new(HashMap::new())),
            describe_failure: Arc::new(RwLock::new(None)),
            next_wait_error: Arc::new(RwLock::new(None)),
            next_terminate_error: Arc::new(RwLock::new(None)),
            ignore_filters: Arc::new(RwLock::new(false)),
            status_probe: Arc::new(RwLock::new(None)),
            observed: Arc::new(RwLock::new(Vec::new())),
            id_counter: Arc::new(RwLock::new(0)),
            own_id: None,
        }
    }

    /// Give the process an instance identity.
    pub fn with_own_id(mut self, id: &str) -> Self {
        self.own_id = Some(InstanceId::new(id));
        self
    }

    /// Get all recorded launches.
    pub async fn launches(&self) -> Vec<RecordedLaunch> {
        self.launches.read().await.clone()
    }

    /// Get all recorded termination requests.
    pub async fn terminations(&self) -> Vec<Vec<InstanceId>> {
        self.terminations.read().await.clone()
    }

    /// Number of wait_until_running calls.
    pub async fn wait_calls(&self) -> usize {
        *self.wait_calls.read().await
    }

    /// Make every launch for this item fail.
    pub async fn fail_launch_for(&self, item: &str, error: ComputeError) {
        self.launch_failures
            .write()
            .await
            .insert(item.to_string(), error);
    }

    /// Let launches for this item succeed again.
    pub async fn clear_launch_failure(&self, item: &str) {
        self.launch_failures.write().await.remove(item);
    }

    /// Fail the next describe_instances call.
    pub async fn set_next_describe_error(&self, error: ComputeError) {
        self.fail_describe_after(0, error).await;
    }

    /// Let `successes` describe calls through, then fail one.
    pub async fn fail_describe_after(&self, successes: usize, error: ComputeError) {
        *self.describe_failure.write().await = Some((successes, error));
    }

    /// Fail the next wait_until_running call; the instance stays as it is.
    pub async fn set_next_wait_error(&self, error: ComputeError) {
        *self.next_wait_error.write().await = Some(error);
    }

    /// Fail the next terminate_instances call.
    pub async fn set_next_terminate_error(&self, error: ComputeError) {
        *self.next_terminate_error.write().await = Some(error);
    }

    /// Simulate a provider that ignores filters.
    pub async fn ignore_filters(&self, ignore: bool) {
        *self.ignore_filters.write().await = ignore;
    }

    /// Record the launched item's status in `store` at each launch.
    pub async fn observe_status(&self, store: Arc<dyn StatusStore>) {
        *self.status_probe.write().await = Some(store);
    }

    /// Statuses recorded by the probe.
    pub async fn observed_statuses(&self) -> Vec<(String, Option<ItemStatus>)> {
        self.observed.read().await.clone()
    }

    /// Add an existing instance.
    pub async fn add_instance(&self, id: &str, state: InstanceState, tags: Tags) {
        self.instances.write().await.push(WorkerInstance {
            id: InstanceId::new(id),
            state,
            tags,
            launched_at: Utc::now(),
        });
    }

    /// Set the state for an instance directly.
    pub async fn set_state(&self, id: &InstanceId, state: InstanceState) {
        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.iter_mut().find(|i| &i.id == id) {
            instance.state = state;
        }
    }

    /// Mark every instance launched for this item as terminated.
    pub async fn finish_item(&self, item: &str) {
        let mut instances = self.instances.write().await;
        for instance in instances
            .iter_mut()
            .filter(|i| i.tag(crate::compute::TAG_ITEM) == Some(item))
        {
            instance.state = InstanceState::Terminated;
        }
    }

    async fn next_id(&self) -> InstanceId {
        let mut counter = self.id_counter.write().await;
        *counter += 1;
        InstanceId::new(format!("i-mock-{:04}", *counter))
    }
}

#[async_trait]
impl ComputeProvider for MockComputeProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run_instance(&self, spec: &LaunchSpec) -> Result<InstanceId, ComputeError> {
        let item = spec.boot.item.clone().unwrap_or_default();

        if let Some(store) = self.status_probe.read().await.as_ref() {
            let status = store
                .get(&spec.boot.group, &item)
                .ok()
                .flatten()
                .map(|w| w.status);
            self.observed.write().await.push((item.clone(), status));
        }

        if let Some(error) = self.launch_failures.read().await.get(&item) {
            return Err(error.clone());
        }

        let id = self.next_id().await;
        self.launches.write().await.push(RecordedLaunch {
            id: id.clone(),
            spec: spec.clone(),
            timestamp: Utc::now(),
        });
        self.instances.write().await.push(WorkerInstance {
            id: id.clone(),
            state: InstanceState::Running,
            tags: spec.tags.clone(),
            launched_at: Utc::now(),
        });

        Ok(id)
    }

    async fn wait_until_running(&self, id: &InstanceId) -> Result<(), ComputeError> {
        *self.wait_calls.write().await += 1;
        if let Some(error) = self.next_wait_error.write().await.take() {
            return Err(error);
        }
        let instances = self.instances.read().await;
        match instances.iter().find(|i| &i.id == id) {
            Some(instance) if instance.state == InstanceState::Terminated => {
                Err(ComputeError::NotRunning {
                    id: id.to_string(),
                    reason: "terminated".to_string(),
                })
            }
            Some(_) => Ok(()),
            None => Err(ComputeError::InstanceNotFound(id.to_string())),
        }
    }

    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<WorkerInstance>, ComputeError> {
        {
            let mut failure = self.describe_failure.write().await;
            let fail_now = match failure.as_mut() {
                Some((remaining, _)) if *remaining > 0 => {
                    *remaining -= 1;
                    false
                }
                Some(_) => true,
                None => false,
            };
            if fail_now {
                if let Some((_, error)) = failure.take() {
                    return Err(error);
                }
            }
        }

        let ignore = *self.ignore_filters.read().await;
        Ok(self
            .instances
            .read()
            .await
            .iter()
            .filter(|i| ignore || filter.matches(i))
            .cloned()
            .collect())
    }

    async fn terminate_instances(&self, ids: &[InstanceId]) -> Result<(), ComputeError> {
        if let Some(error) = self.next_terminate_error.write().await.take() {
            return Err(error);
        }

        self.terminations.write().await.push(ids.to_vec());
        let mut instances = self.instances.write().await;
        for instance in instances.iter_mut().filter(|i| ids.contains(&i.id)) {
            instance.state = InstanceState::Terminated;
        }
        Ok(())
    }

    async fn current_instance_id(&self) -> Option<InstanceId> {
        self.own_id.clone()
    }
}
