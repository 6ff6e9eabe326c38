//! Structured boot configuration handed to a freshly created instance.

use serde::{Deserialize, Serialize};

use crate::compute::InstanceRole;

use super::LaunchError;

/// Characters that would need quoting on a shell command line.
const SHELL_METACHARACTERS: &[char] = &[
    '`', '$', '\\', '"', '\'', ';', '&', '|', '<', '>', '(', ')', '{', '}', '[', ']', '*', '?',
    '!', '#', '~',
];

/// Check a launch parameter is non-empty and safe to pass as a shell argument.
pub fn validate_param(name: &'static str, value: &str) -> Result<(), LaunchError> {
    if value.is_empty() {
        return Err(LaunchError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must not be empty",
        });
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || SHELL_METACHARACTERS.contains(&c))
    {
        return Err(LaunchError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "contains characters that are not shell-argument-safe",
        });
    }
    Ok(())
}

/// Browser and driver installed on worker instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSpec {
    /// Browser build channel.
    #[serde(default = "default_browser_channel")]
    pub channel: String,
    /// Browser and driver version (kept in lockstep).
    #[serde(default = "default_browser_version")]
    pub version: String,
}

impl Default for BrowserSpec {
    fn default() -> Self {
        Self {
            channel: default_browser_channel(),
            version: default_browser_version(),
        }
    }
}

fn default_browser_channel() -> String {
    "chrome-for-testing".to_string()
}

fn default_browser_version() -> String {
    "131.0.6778.108".to_string()
}

/// Log files shipped to the external log sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogShippingSpec {
    /// Destination log group.
    pub log_group: String,
    /// Files collected on the instance.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Static installation recipe for a new instance.
///
/// Opaque to the controller: it is carried verbatim to the provisioning
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallManifest {
    /// System packages installed before the payload runs.
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    /// Browser installed for the payload.
    #[serde(default)]
    pub browser: BrowserSpec,
    /// Where the payload binary is fetched from.
    #[serde(default = "default_payload_location")]
    pub payload_location: String,
    /// Optional log shipping setup.
    #[serde(default)]
    pub log_shipping: Option<LogShippingSpec>,
}

impl Default for InstallManifest {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            browser: BrowserSpec::default(),
            payload_location: default_payload_location(),
            log_shipping: None,
        }
    }
}

fn default_packages() -> Vec<String> {
    ["wget", "unzip", "curl", "fonts-liberation", "libnss3", "libgbm1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_payload_location() -> String {
    "scrapefleet-worker".to_string()
}

/// Parameters and installation recipe for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    pub role: InstanceRole,
    pub group: String,
    /// Set for worker instances only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub manifest: InstallManifest,
}

impl BootConfig {
    /// Boot configuration for a worker processing one item.
    pub fn worker(
        group: impl Into<String>,
        item: impl Into<String>,
        manifest: InstallManifest,
    ) -> Self {
        Self {
            role: InstanceRole::Worker,
            group: group.into(),
            item: Some(item.into()),
            manifest,
        }
    }

    /// Boot configuration for a controller supervising one group.
    pub fn controller(group: impl Into<String>, manifest: InstallManifest) -> Self {
        Self {
            role: InstanceRole::Controller,
            group: group.into(),
            item: None,
            manifest,
        }
    }

    /// Arguments the payload is started with.
    pub fn args(&self) -> Vec<&str> {
        let mut args = vec![self.group.as_str()];
        if let Some(ref item) = self.item {
            args.push(item);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_plain_names() {
        for value in ["UK", "London", "st-albans", "Saint_Etienne", "Zürich", "a.b:c"] {
            assert!(validate_param("item", value).is_ok(), "{} rejected", value);
        }
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = validate_param("group", "").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_validate_rejects_shell_unsafe() {
        for value in ["a b", "x;rm", "$(id)", "`id`", "a\nb", "it's", "a|b", "a>b"] {
            assert!(validate_param("item", value).is_err(), "{:?} accepted", value);
        }
    }

    #[test]
    fn test_worker_boot_args() {
        let boot = BootConfig::worker("UK", "London", InstallManifest::default());
        assert_eq!(boot.role, InstanceRole::Worker);
        assert_eq!(boot.args(), vec!["UK", "London"]);

        let boot = BootConfig::controller("UK", InstallManifest::default());
        assert_eq!(boot.args(), vec!["UK"]);
    }

    #[test]
    fn test_boot_config_json_roundtrip_keeps_parameters_structured() {
        let boot = BootConfig::worker("FR", "Paris", InstallManifest::default());
        let json = serde_json::to_value(&boot).unwrap();
        assert_eq!(json["role"], "worker");
        assert_eq!(json["group"], "FR");
        assert_eq!(json["item"], "Paris");
        assert_eq!(json["manifest"]["browser"]["version"], "131.0.6778.108");

        let parsed: BootConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, boot);
    }

    #[test]
    fn test_manifest_deserialize_partial() {
        let manifest: InstallManifest = toml::from_str(
            r#"
            payload_location = "s3://bucket/worker"

            [log_shipping]
            log_group = "/scrapefleet/workers"
            files = ["/var/log/user-data.log"]
            "#,
        )
        .unwrap();
        assert_eq!(manifest.payload_location, "s3://bucket/worker");
        assert_eq!(manifest.browser, BrowserSpec::default());
        assert!(!manifest.packages.is_empty());
        assert_eq!(manifest.log_shipping.unwrap().files.len(), 1);
    }
}
