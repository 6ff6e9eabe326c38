use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use scrapefleet_cli::args::{parse_or_exit, ControllerArgs};
use scrapefleet_cli::{bootstrap, http, shutdown, telemetry};
use scrapefleet_core::config::{Config, LoggingConfig};
use scrapefleet_core::controller::{Controller, ControllerOutcome};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    let args: ControllerArgs = parse_or_exit();

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

async fn run(args: ControllerArgs, config: Config) -> Result<()> {
    info!("fleetctl {} starting for group {}", VERSION, args.group);

    let store = bootstrap::open_store(&config)?;
    let provider = bootstrap::build_provider(&config)?;
    let launcher = bootstrap::build_launcher(&config, Arc::clone(&provider));

    let mut controller = Controller::new(
        args.group,
        config.controller.clone(),
        store,
        provider,
        launcher,
    );

    let token = CancellationToken::new();
    shutdown::cancel_on_signal(token.clone());

    // Optional status/metrics endpoint
    let server = config.metrics.listen.map(|addr| {
        let router = http::create_router(controller.status_handle());
        tokio::spawn(http::serve(addr, router, token.clone()))
    });

    let result = controller.run(token.clone()).await;

    // Stop the endpoint whatever the outcome
    token.cancel();
    if let Some(server) = server {
        match server.await {
            Ok(Err(e)) => error!("Status endpoint failed: {:#}", e),
            Err(e) => error!("Status endpoint task panicked: {}", e),
            Ok(Ok(())) => {}
        }
    }

    match result.context("Controller failed to start")? {
        ControllerOutcome::Done => info!("All work items complete, controller exiting"),
        ControllerOutcome::Cancelled => info!("Controller shut down before completion"),
    }

    Ok(())
}
