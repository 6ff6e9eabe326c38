//! Configuration loading and component wiring shared by the binaries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use scrapefleet_core::compute::{ComputeProvider, LocalProcessProvider};
use scrapefleet_core::config::{
    load_config, load_config_from_env, validate_config, ComputeBackend, Config,
};
use scrapefleet_core::launcher::WorkerLauncher;
use scrapefleet_core::status::{SqliteStatusStore, StatusStore};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "SCRAPEFLEET_CONFIG";

/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "scrapefleet.toml";

/// Where configuration should come from.
///
/// `SCRAPEFLEET_CONFIG` wins when set (the file must then exist); otherwise
/// `scrapefleet.toml` in the working directory if it exists; otherwise none.
pub fn config_source() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let default = Path::new(DEFAULT_CONFIG_FILE);
    default.exists().then(|| default.to_path_buf())
}

/// Load and validate the configuration.
pub fn load() -> Result<Config> {
    let config = match config_source() {
        Some(path) => load_config(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => load_config_from_env().context("Failed to load config from environment")?,
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// Open the shared status store.
pub fn open_store(config: &Config) -> Result<Arc<dyn StatusStore>> {
    let store = SqliteStatusStore::new(&config.store.path)
        .with_context(|| format!("Failed to open status store at {:?}", config.store.path))?;
    info!("Status store opened at {:?}", config.store.path);
    Ok(Arc::new(store))
}

/// Build the configured compute provider.
pub fn build_provider(config: &Config) -> Result<Arc<dyn ComputeProvider>> {
    match config.compute.backend {
        ComputeBackend::Local => {
            let local = &config.compute.local;
            info!(
                "Using local process compute backend (worker: {:?}, controller: {:?})",
                local.worker_program, local.controller_program
            );
            Ok(Arc::new(LocalProcessProvider::new(local.clone())))
        }
    }
}

/// Build a launcher on top of `provider`.
pub fn build_launcher(config: &Config, provider: Arc<dyn ComputeProvider>) -> WorkerLauncher {
    WorkerLauncher::new(provider, &config.compute)
        .with_wait_for_running(config.controller.wait_for_running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_store_creates_file() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.path = dir.path().join("status.db");

        let store = tokio_test::assert_ok!(open_store(&config));
        assert!(store.items_by_group("UK").unwrap().is_empty());
        assert!(config.store.path.exists());
    }

    #[test]
    fn test_build_provider_local() {
        let provider = build_provider(&Config::default()).unwrap();
        assert_eq!(provider.name(), "local");
    }
}
