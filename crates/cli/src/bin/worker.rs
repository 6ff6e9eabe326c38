use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use scrapefleet_cli::args::{parse_or_exit, WorkerArgs};
use scrapefleet_cli::{bootstrap, telemetry};
use scrapefleet_core::compute::ComputeProvider;
use scrapefleet_core::config::{Config, LoggingConfig};
use scrapefleet_core::payload::{PageProbe, SelfTermination, WorkerPayload};

#[tokio::main]
async fn main() {
    let args: WorkerArgs = parse_or_exit();

    let config = match bootstrap::load() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_logging(&LoggingConfig::default());
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    };
    telemetry::init_logging(&config.logging);

    match run(args, config).await {
        Ok(SelfTermination::Requested { .. }) => {}
        Ok(SelfTermination::NoIdentity) => {
            error!("Worker finished without an instance to terminate");
            std::process::exit(1);
        }
        Ok(SelfTermination::Failed { error }) => {
            error!("Worker could not terminate its instance: {}", error);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: WorkerArgs, config: Config) -> Result<SelfTermination> {
    info!("Worker starting for {}:{}", args.group, args.item);

    let provider = bootstrap::build_provider(&config)?;

    let store = match bootstrap::open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            // Nothing can be recorded; still release the instance.
            error!("Cannot record results: {:#}", e);
            release(provider.as_ref()).await;
            return Err(e);
        }
    };

    let task = PageProbe::new(&config.worker).context("Failed to create page probe")?;
    let payload = WorkerPayload::new(store, provider, Arc::new(task));

    let outcome = payload.run(&args.group, &args.item).await;
    info!(
        "Worker finished {}:{} with status {}",
        args.group, args.item, outcome.status
    );

    Ok(outcome.termination)
}

async fn release(provider: &dyn ComputeProvider) {
    if let Some(id) = provider.current_instance_id().await {
        if let Err(e) = provider.terminate_instances(std::slice::from_ref(&id)).await {
            error!("Failed to terminate instance {}: {}", id, e);
        }
    }
}
