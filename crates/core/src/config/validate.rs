use super::{types::Config, ComputeBackend, ConfigError};

/// Longest accepted orphan timeout (one year).
pub const MAX_ORPHAN_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

/// Validate configuration
/// Currently validates:
/// - Controller capacity, interval and confirmation count are non-zero
/// - Worker target URL parses once placeholders are filled
/// - Local backend programs are set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let controller = &config.controller;
    if controller.max_instances == 0 {
        return Err(ConfigError::ValidationError(
            "controller.max_instances cannot be 0".to_string(),
        ));
    }
    if controller.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "controller.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if controller.completion_confirmations == 0 {
        return Err(ConfigError::ValidationError(
            "controller.completion_confirmations cannot be 0".to_string(),
        ));
    }
    if controller.orphan_timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "controller.orphan_timeout_secs cannot be 0".to_string(),
        ));
    }
    if let Some(secs) = controller.orphan_timeout_secs {
        if secs > MAX_ORPHAN_TIMEOUT_SECS {
            return Err(ConfigError::ValidationError(format!(
                "controller.orphan_timeout_secs cannot exceed {} (got {})",
                MAX_ORPHAN_TIMEOUT_SECS, secs
            )));
        }
    }

    let sample_url = config
        .worker
        .target_url
        .replace("{group}", "group")
        .replace("{item}", "item");
    if let Err(e) = reqwest::Url::parse(&sample_url) {
        return Err(ConfigError::ValidationError(format!(
            "worker.target_url is not a valid URL: {}",
            e
        )));
    }

    match config.compute.backend {
        ComputeBackend::Local => {
            let local = &config.compute.local;
            if local.worker_program.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(
                    "compute.local.worker_program cannot be empty".to_string(),
                ));
            }
            if local.controller_program.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(
                    "compute.local.controller_program cannot be empty".to_string(),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_capacity_fails() {
        let mut config = Config::default();
        config.controller.max_instances = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("max_instances"));
    }

    #[test]
    fn test_validate_zero_interval_fails() {
        let mut config = Config::default();
        config.controller.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_confirmations_fails() {
        let mut config = Config::default();
        config.controller.completion_confirmations = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_orphan_timeout_bounds() {
        let mut config = Config::default();
        config.controller.orphan_timeout_secs = Some(MAX_ORPHAN_TIMEOUT_SECS);
        assert!(validate_config(&config).is_ok());

        for secs in [MAX_ORPHAN_TIMEOUT_SECS + 1, 10_000_000_000_000, u64::MAX] {
            config.controller.orphan_timeout_secs = Some(secs);
            let err = validate_config(&config).unwrap_err();
            assert!(err.to_string().contains("orphan_timeout_secs"));
        }
    }

    #[test]
    fn test_validate_bad_target_url_fails() {
        let mut config = Config::default();
        config.worker.target_url = "not a url".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("target_url"));
    }

    #[test]
    fn test_validate_templated_url_ok() {
        let mut config = Config::default();
        config.worker.target_url =
            "https://example.com/search?country={group}&q={item}".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_worker_program_fails() {
        let mut config = Config::default();
        config.compute.local.worker_program = PathBuf::new();
        assert!(validate_config(&config).is_err());
    }
}
