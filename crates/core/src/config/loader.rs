use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides, e.g. `SCRAPEFLEET_CONTROLLER__MAX_INSTANCES=4`.
pub const CONFIG_ENV_PREFIX: &str = "SCRAPEFLEET_";

/// Variables under the prefix that are not configuration keys.
const NON_CONFIG_VARS: &[&str] = &["config", "instance_id", "boot_config"];

fn env_overrides() -> Env {
    Env::prefixed(CONFIG_ENV_PREFIX)
        .ignore(NON_CONFIG_VARS)
        .split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(env_overrides())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load built-in defaults with environment variable overrides (no file)
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(env_overrides())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[controller]
max_instances = 3
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.controller.max_instances, 3);
    }

    #[test]
    fn test_load_config_from_str_invalid() {
        let toml = r#"
[controller]
max_instances = "lots"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/scrapefleet.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[store]
path = "/tmp/fleet.db"

[controller]
poll_interval_ms = 500
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.store.path.to_str().unwrap(), "/tmp/fleet.db");
        assert_eq!(config.controller.poll_interval_ms, 500);
        // Untouched sections keep their defaults
        assert_eq!(config.controller.max_instances, 2);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "scrapefleet.toml",
                r#"
[controller]
max_instances = 3
"#,
            )?;
            jail.set_env("SCRAPEFLEET_CONTROLLER__MAX_INSTANCES", "7");
            jail.set_env("SCRAPEFLEET_INSTANCE_ID", "local-abc");

            let config = load_config(Path::new("scrapefleet.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.controller.max_instances, 7);
            Ok(())
        });
    }

    #[test]
    fn test_env_only_config() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SCRAPEFLEET_STORE__PATH", "/srv/status.db");
            let config = load_config_from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.store.path.to_str().unwrap(), "/srv/status.db");
            assert_eq!(config.controller.max_instances, 2);
            Ok(())
        });
    }
}
