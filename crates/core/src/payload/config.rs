//! Worker payload configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the scrape task run by workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Page to fetch. `{group}` and `{item}` are replaced with the
    /// url-encoded identifiers.
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Directory receiving `<group>_<item>.html` page snapshots.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User-Agent header sent with the request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_target_url() -> String {
    "https://github.com".to_string()
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("/tmp/scrapefleet")
}

fn default_request_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("scrapefleet/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            artifact_dir: default_artifact_dir(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.target_url, "https://github.com");
        assert_eq!(config.request_timeout_secs, 60);
        assert!(config.user_agent.starts_with("scrapefleet/"));
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            target_url = "https://example.com/{item}"
            request_timeout_secs = 5
        "#;
        let config: WorkerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.target_url, "https://example.com/{item}");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.artifact_dir, PathBuf::from("/tmp/scrapefleet"));
    }
}
