use anyhow::{Context, Result};
use tracing::{error, info};

use scrapefleet_cli::args::{parse_or_exit, LaunchArgs};
use scrapefleet_cli::{bootstrap, telemetry};
use scrapefleet_core::config::{Config, LoggingConfig};

#[tokio::main]
async fn main() {
    let args: LaunchArgs = parse_or_exit();

    let config = match bootstrap::load() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_logging(&LoggingConfig::default());
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    };
    telemetry::init_logging(&config.logging);

    if let Err(e) = run(args, config).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: LaunchArgs, config: Config) -> Result<()> {
    let provider = bootstrap::build_provider(&config)?;
    let launcher = bootstrap::build_launcher(&config, provider);

    let id = launcher
        .launch_controller(&args.group)
        .await
        .with_context(|| format!("Failed to launch controller for group {}", args.group))?;

    info!("Controller for group {} launched as {}", args.group, id);
    println!("{}", id);
    Ok(())
}
