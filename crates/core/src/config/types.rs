use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::controller::ControllerConfig;
use crate::launcher::InstallManifest;
use crate::payload::WorkerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Status store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// SQLite file shared by the controller and its workers
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("scrapefleet.db")
}

/// Available compute backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComputeBackend {
    #[default]
    Local,
    // Future: cloud provider APIs
}

/// Compute provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComputeConfig {
    #[serde(default)]
    pub backend: ComputeBackend,
    /// Local process backend settings
    #[serde(default)]
    pub local: LocalComputeConfig,
    /// Instance size requested for workers
    #[serde(default = "default_worker_instance_type")]
    pub worker_instance_type: String,
    /// Instance size requested for controllers
    #[serde(default = "default_controller_instance_type")]
    pub controller_instance_type: String,
    /// Installation recipe handed to every new instance
    #[serde(default)]
    pub manifest: InstallManifest,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            backend: ComputeBackend::default(),
            local: LocalComputeConfig::default(),
            worker_instance_type: default_worker_instance_type(),
            controller_instance_type: default_controller_instance_type(),
            manifest: InstallManifest::default(),
        }
    }
}

fn default_worker_instance_type() -> String {
    "t3.medium".to_string()
}

fn default_controller_instance_type() -> String {
    "t3.micro".to_string()
}

/// Local process backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalComputeConfig {
    /// Program started for each worker instance
    #[serde(default = "default_worker_program")]
    pub worker_program: PathBuf,
    /// Program started for each controller instance
    #[serde(default = "default_controller_program")]
    pub controller_program: PathBuf,
    /// Directory receiving one log file per instance (None = inherit stdout/stderr)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LocalComputeConfig {
    fn default() -> Self {
        Self {
            worker_program: default_worker_program(),
            controller_program: default_controller_program(),
            log_dir: None,
        }
    }
}

fn default_worker_program() -> PathBuf {
    PathBuf::from("fleet-worker")
}

fn default_controller_program() -> PathBuf {
    PathBuf::from("fleetctl")
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive (RUST_LOG takes precedence)
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Metrics and status endpoint configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Address for the /metrics and /status endpoint (None = disabled)
    #[serde(default)]
    pub listen: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.store.path.to_str().unwrap(), "scrapefleet.db");
        assert_eq!(config.controller.max_instances, 2);
        assert_eq!(config.controller.poll_interval_ms, 30_000);
        assert_eq!(config.controller.completion_confirmations, 3);
        assert_eq!(config.compute.backend, ComputeBackend::Local);
        assert_eq!(config.compute.worker_instance_type, "t3.medium");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.metrics.listen.is_none());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[store]
path = "/data/status.db"

[controller]
poll_interval_ms = 1000
max_instances = 4
completion_confirmations = 5
orphan_timeout_secs = 1800

[compute]
backend = "local"
worker_instance_type = "t3.large"

[compute.local]
worker_program = "/opt/scrapefleet/fleet-worker"
log_dir = "/var/log/scrapefleet"

[compute.manifest]
payload_location = "s3://scrapefleet-code/fleet-worker"

[worker]
target_url = "https://example.com/{group}/{item}"
artifact_dir = "/tmp/artifacts"

[logging]
format = "json"
filter = "debug"

[metrics]
listen = "127.0.0.1:9100"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.path.to_str().unwrap(), "/data/status.db");
        assert_eq!(config.controller.max_instances, 4);
        assert_eq!(config.controller.orphan_timeout_secs, Some(1800));
        assert_eq!(config.compute.worker_instance_type, "t3.large");
        assert_eq!(config.compute.controller_instance_type, "t3.micro");
        assert_eq!(
            config.compute.local.worker_program.to_str().unwrap(),
            "/opt/scrapefleet/fleet-worker"
        );
        assert_eq!(
            config.compute.local.controller_program.to_str().unwrap(),
            "fleetctl"
        );
        assert_eq!(
            config.compute.manifest.payload_location,
            "s3://scrapefleet-code/fleet-worker"
        );
        assert_eq!(config.worker.target_url, "https://example.com/{group}/{item}");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.metrics.listen.unwrap().to_string(),
            "127.0.0.1:9100"
        );
    }

    #[test]
    fn test_unknown_backend_fails() {
        let toml = r#"
[compute]
backend = "mainframe"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
