//! Local process compute provider.
//!
//! Every instance is a child process of the current program: the worker
//! binary for worker launches, the controller binary for controller launches.
//! Parameters are passed structurally (arguments plus the serialized boot
//! configuration in the environment), never as a rendered script.

use std::collections::HashMap;
use std::fs::{self, File};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LocalComputeConfig;

use super::{
    ComputeError, ComputeProvider, InstanceFilter, InstanceId, InstanceRole, InstanceState,
    LaunchSpec, Tags, WorkerInstance,
};

/// Environment variable carrying the instance id into the child.
pub const INSTANCE_ID_ENV: &str = "SCRAPEFLEET_INSTANCE_ID";

/// Environment variable carrying the JSON boot configuration into the child.
pub const BOOT_CONFIG_ENV: &str = "SCRAPEFLEET_BOOT_CONFIG";

struct LocalInstance {
    child: Child,
    tags: Tags,
    launched_at: DateTime<Utc>,
    exited: bool,
}

impl LocalInstance {
    /// Reap the child if it has exited and report its state.
    fn refresh(&mut self) -> InstanceState {
        if !self.exited {
            match self.child.try_wait() {
                Ok(Some(_)) => self.exited = true,
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to poll child process: {}", e);
                    self.exited = true;
                }
            }
        }
        if self.exited {
            InstanceState::Terminated
        } else {
            InstanceState::Running
        }
    }
}

/// Compute provider backed by local child processes.
pub struct LocalProcessProvider {
    config: LocalComputeConfig,
    instances: Mutex<HashMap<InstanceId, LocalInstance>>,
    own_id: Option<InstanceId>,
}

impl LocalProcessProvider {
    /// Create a provider. The own instance id is read from the environment
    /// when this process was itself launched by a local provider.
    pub fn new(config: LocalComputeConfig) -> Self {
        let own_id = std::env::var(INSTANCE_ID_ENV)
            .ok()
            .filter(|id| !id.is_empty())
            .map(InstanceId::new);

        Self {
            config,
            instances: Mutex::new(HashMap::new()),
            own_id,
        }
    }

    /// Override the own instance identity.
    pub fn with_own_id(mut self, id: Option<InstanceId>) -> Self {
        self.own_id = id;
        self
    }

    fn generate_id() -> InstanceId {
        let uuid = Uuid::new_v4().simple().to_string();
        InstanceId::new(format!("local-{}", &uuid[..12]))
    }

    fn build_command(&self, id: &InstanceId, spec: &LaunchSpec) -> Result<Command, ComputeError> {
        let program = match spec.role() {
            InstanceRole::Worker => &self.config.worker_program,
            InstanceRole::Controller => &self.config.controller_program,
        };

        let boot_json = serde_json::to_string(&spec.boot)
            .map_err(|e| ComputeError::Provider(format!("failed to encode boot config: {}", e)))?;

        let mut cmd = Command::new(program);
        cmd.args(spec.boot.args())
            .env(INSTANCE_ID_ENV, id.as_str())
            .env(BOOT_CONFIG_ENV, boot_json)
            .stdin(Stdio::null())
            .kill_on_drop(false);

        if let Some(ref log_dir) = self.config.log_dir {
            fs::create_dir_all(log_dir).map_err(|e| {
                ComputeError::LaunchRejected(format!(
                    "cannot create log directory {}: {}",
                    log_dir.display(),
                    e
                ))
            })?;
            let log_path = log_dir.join(format!("{}.log", id));
            let stdout = File::create(&log_path).map_err(|e| {
                ComputeError::LaunchRejected(format!(
                    "cannot create log file {}: {}",
                    log_path.display(),
                    e
                ))
            })?;
            let stderr = stdout
                .try_clone()
                .map_err(|e| ComputeError::LaunchRejected(e.to_string()))?;
            cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
        }

        Ok(cmd)
    }
}

#[async_trait]
impl ComputeProvider for LocalProcessProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn run_instance(&self, spec: &LaunchSpec) -> Result<InstanceId, ComputeError> {
        let id = Self::generate_id();
        let mut cmd = self.build_command(&id, spec)?;

        debug!(
            instance_id = %id,
            instance_type = %spec.instance_type,
            "Spawning local instance"
        );

        let child = cmd.spawn().map_err(|e| {
            ComputeError::LaunchRejected(format!("failed to spawn {:?}: {}", spec.role(), e))
        })?;

        info!(
            instance_id = %id,
            pid = child.id().unwrap_or_default(),
            group = %spec.boot.group,
            "Local instance started"
        );

        self.instances.lock().await.insert(
            id.clone(),
            LocalInstance {
                child,
                tags: spec.tags.clone(),
                launched_at: Utc::now(),
                exited: false,
            },
        );

        Ok(id)
    }

    async fn wait_until_running(&self, id: &InstanceId) -> Result<(), ComputeError> {
        let mut instances = self.instances.lock().await;
        let instance = instances
            .get_mut(id)
            .ok_or_else(|| ComputeError::InstanceNotFound(id.to_string()))?;

        // A spawned process is running; one that already finished cleanly ran.
        match instance.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                instance.exited = true;
                if status.success() {
                    Ok(())
                } else {
                    Err(ComputeError::NotRunning {
                        id: id.to_string(),
                        reason: format!("process exited with {}", status),
                    })
                }
            }
            Err(e) => Err(ComputeError::Provider(e.to_string())),
        }
    }

    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<WorkerInstance>, ComputeError> {
        let mut instances = self.instances.lock().await;

        let mut result: Vec<WorkerInstance> = instances
            .iter_mut()
            .map(|(id, instance)| WorkerInstance {
                id: id.clone(),
                state: instance.refresh(),
                tags: instance.tags.clone(),
                launched_at: instance.launched_at,
            })
            .filter(|instance| filter.matches(instance))
            .collect();

        result.sort_by(|a, b| a.launched_at.cmp(&b.launched_at));
        Ok(result)
    }

    async fn terminate_instances(&self, ids: &[InstanceId]) -> Result<(), ComputeError> {
        let mut instances = self.instances.lock().await;

        for id in ids {
            if let Some(instance) = instances.get_mut(id) {
                if instance.refresh() == InstanceState::Terminated {
                    debug!(instance_id = %id, "Instance already exited");
                    continue;
                }
                instance
                    .child
                    .start_kill()
                    .map_err(|e| ComputeError::Provider(format!("failed to kill {}: {}", id, e)))?;
                info!(instance_id = %id, "Terminated local instance");
            } else if self.own_id.as_ref() == Some(id) {
                info!(
                    instance_id = %id,
                    "Termination of own instance requested; process exits when its work returns"
                );
            } else {
                return Err(ComputeError::InstanceNotFound(id.to_string()));
            }
        }

        Ok(())
    }

    async fn current_instance_id(&self) -> Option<InstanceId> {
        self.own_id.clone()
    }
}
