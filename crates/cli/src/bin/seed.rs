use anyhow::{Context, Result};
use tracing::{error, info};

use scrapefleet_cli::args::{parse_or_exit, SeedArgs};
use scrapefleet_cli::{bootstrap, telemetry};
use scrapefleet_core::config::{Config, LoggingConfig};
use scrapefleet_core::launcher::validate_param;

fn main() {
    let args: SeedArgs = parse_or_exit();

    let config = match bootstrap::load() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_logging(&LoggingConfig::default());
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    };
    telemetry::init_logging(&config.logging);

    if let Err(e) = run(args, config) {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: SeedArgs, config: Config) -> Result<()> {
    // Items that can never be handed to a worker are rejected up front.
    validate_param("group", &args.group)?;
    for item in &args.items {
        validate_param("item", item)?;
    }

    let store = bootstrap::open_store(&config)?;
    let inserted = store
        .seed_items(&args.group, &args.items)
        .with_context(|| format!("Failed to seed group {}", args.group))?;
    let stats = store.group_stats(&args.group)?;

    info!(
        "Seeded {} new item(s) into group {} ({} total, {} pending)",
        inserted, args.group, stats.total, stats.pending
    );
    println!("{}", inserted);
    Ok(())
}
