//! Controller configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the group controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Time between reconciliation cycles (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Ceiling on concurrently active workers for the group.
    /// Bounds in-flight workers, not total work; fixed for the whole run.
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,

    /// Consecutive all-complete snapshots required before shutting down.
    /// A single snapshot can be stale while workers are still writing.
    #[serde(default = "default_completion_confirmations")]
    pub completion_confirmations: u32,

    /// Block each launch until the provider reports the instance running.
    #[serde(default = "default_wait_for_running")]
    pub wait_for_running: bool,

    /// Requeue IN_PROGRESS items older than this (seconds) that have no
    /// live worker. Disabled when unset.
    #[serde(default)]
    pub orphan_timeout_secs: Option<u64>,
}

fn default_poll_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_max_instances() -> usize {
    2
}

fn default_completion_confirmations() -> u32 {
    3
}

fn default_wait_for_running() -> bool {
    true
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_instances: default_max_instances(),
            completion_confirmations: default_completion_confirmations(),
            wait_for_running: default_wait_for_running(),
            orphan_timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.poll_interval_ms, 30_000);
        assert_eq!(config.max_instances, 2);
        assert_eq!(config.completion_confirmations, 3);
        assert!(config.wait_for_running);
        assert!(config.orphan_timeout_secs.is_none());
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            max_instances = 5
        "#;
        let config: ControllerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_instances, 5);
        assert_eq!(config.poll_interval_ms, 30_000);
        assert_eq!(config.completion_confirmations, 3);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            poll_interval_ms = 1000
            max_instances = 4
            completion_confirmations = 2
            wait_for_running = false
            orphan_timeout_secs = 900
        "#;
        let config: ControllerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.max_instances, 4);
        assert_eq!(config.completion_confirmations, 2);
        assert!(!config.wait_for_running);
        assert_eq!(config.orphan_timeout_secs, Some(900));
    }
}
