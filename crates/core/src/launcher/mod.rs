//! Worker launcher.
//!
//! Creates one compute instance per `(group, item)` pair. Capacity and
//! admission control belong to the caller; the launcher only validates the
//! parameters, builds the launch spec and talks to the provider.

mod boot;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::compute::{
    ComputeError, ComputeProvider, InstanceId, InstanceRole, LaunchSpec, Tags, TAG_GROUP,
    TAG_ITEM, TAG_NAME, TAG_PURPOSE,
};
use crate::config::ComputeConfig;

pub use boot::{validate_param, BootConfig, BrowserSpec, InstallManifest, LogShippingSpec};

/// Errors from launching an instance.
#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    /// A launch parameter failed validation.
    #[error("invalid {name} {value:?}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The provider failed to create or start the instance.
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

/// Launches worker and controller instances through a compute provider.
#[derive(Clone)]
pub struct WorkerLauncher {
    provider: Arc<dyn ComputeProvider>,
    worker_instance_type: String,
    controller_instance_type: String,
    manifest: InstallManifest,
    wait_for_running: bool,
}

impl WorkerLauncher {
    /// Create a launcher using the instance types and manifest from `config`.
    pub fn new(provider: Arc<dyn ComputeProvider>, config: &ComputeConfig) -> Self {
        Self {
            provider,
            worker_instance_type: config.worker_instance_type.clone(),
            controller_instance_type: config.controller_instance_type.clone(),
            manifest: config.manifest.clone(),
            wait_for_running: true,
        }
    }

    /// Whether `launch` blocks until the instance is running (default: true).
    pub fn with_wait_for_running(mut self, wait: bool) -> Self {
        self.wait_for_running = wait;
        self
    }

    /// Build the launch spec for a worker without creating anything.
    pub fn worker_spec(&self, group: &str, item: &str) -> Result<LaunchSpec, LaunchError> {
        validate_param("group", group)?;
        validate_param("item", item)?;

        let mut tags = Self::base_tags(InstanceRole::Worker, group);
        tags.insert(
            TAG_NAME.to_string(),
            format!("{}-{}-{}", InstanceRole::Worker.purpose(), group, item),
        );
        tags.insert(TAG_ITEM.to_string(), item.to_string());

        Ok(LaunchSpec {
            instance_type: self.worker_instance_type.clone(),
            boot: BootConfig::worker(group, item, self.manifest.clone()),
            tags,
        })
    }

    /// Build the launch spec for a controller without creating anything.
    pub fn controller_spec(&self, group: &str) -> Result<LaunchSpec, LaunchError> {
        validate_param("group", group)?;

        let mut tags = Self::base_tags(InstanceRole::Controller, group);
        tags.insert(
            TAG_NAME.to_string(),
            format!("{}-{}", InstanceRole::Controller.purpose(), group),
        );

        Ok(LaunchSpec {
            instance_type: self.controller_instance_type.clone(),
            boot: BootConfig::controller(group, self.manifest.clone()),
            tags,
        })
    }

    /// Create a worker instance for `(group, item)` and return its id.
    pub async fn launch(&self, group: &str, item: &str) -> Result<InstanceId, LaunchError> {
        let spec = self.worker_spec(group, item)?;
        self.create(&spec).await
    }

    /// Create a controller instance supervising `group`.
    pub async fn launch_controller(&self, group: &str) -> Result<InstanceId, LaunchError> {
        let spec = self.controller_spec(group)?;
        self.create(&spec).await
    }

    async fn create(&self, spec: &LaunchSpec) -> Result<InstanceId, LaunchError> {
        let id = self.provider.run_instance(spec).await?;
        info!(
            instance_id = %id,
            role = ?spec.role(),
            group = %spec.boot.group,
            item = spec.boot.item.as_deref().unwrap_or("-"),
            provider = self.provider.name(),
            "Launched instance"
        );

        if self.wait_for_running {
            debug!(instance_id = %id, "Waiting for instance to be running");
            if let Err(e) = self.provider.wait_until_running(&id).await {
                // The instance exists; release it so a retry cannot double up.
                warn!(instance_id = %id, error = %e, "Instance failed to start, terminating it");
                if let Err(term_err) = self
                    .provider
                    .terminate_instances(std::slice::from_ref(&id))
                    .await
                {
                    error!(
                        instance_id = %id,
                        error = %term_err,
                        "Failed to terminate instance that did not start"
                    );
                }
                return Err(e.into());
            }
        }

        Ok(id)
    }

    fn base_tags(role: InstanceRole, group: &str) -> Tags {
        let mut tags = Tags::new();
        tags.insert(TAG_PURPOSE.to_string(), role.purpose().to_string());
        tags.insert(TAG_GROUP.to_string(), group.to_string());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::InstanceFilter;
    use crate::testing::MockComputeProvider;

    fn launcher(provider: &Arc<MockComputeProvider>) -> WorkerLauncher {
        WorkerLauncher::new(
            Arc::clone(provider) as Arc<dyn ComputeProvider>,
            &ComputeConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_launch_tags_instance() {
        let provider = Arc::new(MockComputeProvider::new());
        let id = launcher(&provider).launch("UK", "London").await.unwrap();

        let instances = provider
            .describe_instances(&InstanceFilter::new())
            .await
            .unwrap();
        assert_eq!(instances.len(), 1);
        let instance = &instances[0];
        assert_eq!(instance.id, id);
        assert_eq!(instance.tag(TAG_PURPOSE), Some("scrapefleet-worker"));
        assert_eq!(instance.tag(TAG_GROUP), Some("UK"));
        assert_eq!(instance.tag(TAG_ITEM), Some("London"));
        assert_eq!(instance.tag(TAG_NAME), Some("scrapefleet-worker-UK-London"));
    }

    #[tokio::test]
    async fn test_launch_passes_boot_config() {
        let provider = Arc::new(MockComputeProvider::new());
        launcher(&provider).launch("FR", "Paris").await.unwrap();

        let launches = provider.launches().await;
        assert_eq!(launches.len(), 1);
        let spec = &launches[0].spec;
        assert_eq!(spec.boot.role, InstanceRole::Worker);
        assert_eq!(spec.boot.group, "FR");
        assert_eq!(spec.boot.item.as_deref(), Some("Paris"));
        assert_eq!(spec.instance_type, ComputeConfig::default().worker_instance_type);
    }

    #[tokio::test]
    async fn test_launch_waits_for_running() {
        let provider = Arc::new(MockComputeProvider::new());
        launcher(&provider).launch("UK", "London").await.unwrap();
        assert_eq!(provider.wait_calls().await, 1);

        launcher(&provider)
            .with_wait_for_running(false)
            .launch("UK", "Leeds")
            .await
            .unwrap();
        assert_eq!(provider.wait_calls().await, 1);
    }

    #[tokio::test]
    async fn test_failed_start_terminates_instance() {
        let provider = Arc::new(MockComputeProvider::new());
        provider
            .set_next_wait_error(ComputeError::NotRunning {
                id: "pending".to_string(),
                reason: "startup timed out".to_string(),
            })
            .await;

        let result = launcher(&provider).launch("UK", "London").await;
        assert!(matches!(
            result,
            Err(LaunchError::Compute(ComputeError::NotRunning { .. }))
        ));

        let launched = provider.launches().await[0].id.clone();
        assert_eq!(provider.terminations().await, vec![vec![launched]]);
        let active = provider
            .describe_instances(&InstanceFilter::new().active())
            .await
            .unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_item_never_reaches_provider() {
        let provider = Arc::new(MockComputeProvider::new());
        let result = launcher(&provider).launch("UK", "St Albans; rm -rf").await;

        assert!(matches!(result, Err(LaunchError::InvalidParameter { name: "item", .. })));
        assert!(provider.launches().await.is_empty());
    }

    #[tokio::test]
    async fn test_provider_rejection_surfaces() {
        let provider = Arc::new(MockComputeProvider::new());
        provider
            .fail_launch_for("London", ComputeError::LaunchRejected("capacity".to_string()))
            .await;

        let result = launcher(&provider).launch("UK", "London").await;
        assert!(matches!(
            result,
            Err(LaunchError::Compute(ComputeError::LaunchRejected(_)))
        ));
    }

    #[tokio::test]
    async fn test_launch_controller() {
        let provider = Arc::new(MockComputeProvider::new());
        launcher(&provider).launch_controller("UK").await.unwrap();

        let launches = provider.launches().await;
        let spec = &launches[0].spec;
        assert_eq!(spec.boot.role, InstanceRole::Controller);
        assert!(spec.boot.item.is_none());
        assert_eq!(spec.tags.get(TAG_PURPOSE).unwrap(), "scrapefleet-controller");
        assert_eq!(
            spec.instance_type,
            ComputeConfig::default().controller_instance_type
        );
    }
}
