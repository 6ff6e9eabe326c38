//! Command-line arguments for the scrapefleet binaries.

use clap::error::ErrorKind;
use clap::Parser;

/// Run the controller for one group until all of its items are complete.
#[derive(Debug, Parser)]
#[command(name = "fleetctl", version)]
pub struct ControllerArgs {
    /// Group whose work items this controller supervises
    pub group: String,
}

/// Scrape one item, record the result and terminate this instance.
#[derive(Debug, Parser)]
#[command(name = "fleet-worker", version)]
pub struct WorkerArgs {
    /// Group the item belongs to
    pub group: String,
    /// Item to scrape
    pub item: String,
}

/// Start a controller instance for a group.
#[derive(Debug, Parser)]
#[command(name = "fleet-launch", version)]
pub struct LaunchArgs {
    /// Group the new controller supervises (upper-cased)
    #[arg(value_parser = upper_case)]
    pub group: String,
}

fn upper_case(value: &str) -> Result<String, String> {
    Ok(value.to_uppercase())
}

/// Insert PENDING work items for a group.
#[derive(Debug, Parser)]
#[command(name = "fleet-seed", version)]
pub struct SeedArgs {
    /// Group the items belong to
    pub group: String,
    /// Items to add; existing items are left untouched
    #[arg(required = true)]
    pub items: Vec<String>,
}

/// Parse the process arguments.
///
/// Wrong arity prints the usage and exits with code 1; `--help` and
/// `--version` exit normally.
pub fn parse_or_exit<T: Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(1);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_args() {
        let args = ControllerArgs::try_parse_from(["fleetctl", "UK"]).unwrap();
        assert_eq!(args.group, "UK");

        assert!(ControllerArgs::try_parse_from(["fleetctl"]).is_err());
        assert!(ControllerArgs::try_parse_from(["fleetctl", "UK", "FR"]).is_err());
    }

    #[test]
    fn test_worker_args() {
        let args = WorkerArgs::try_parse_from(["fleet-worker", "UK", "London"]).unwrap();
        assert_eq!(args.group, "UK");
        assert_eq!(args.item, "London");

        assert!(WorkerArgs::try_parse_from(["fleet-worker", "UK"]).is_err());
    }

    #[test]
    fn test_launch_upper_cases_group() {
        let args = LaunchArgs::try_parse_from(["fleet-launch", "uk"]).unwrap();
        assert_eq!(args.group, "UK");

        assert!(LaunchArgs::try_parse_from(["fleet-launch"]).is_err());
    }

    #[test]
    fn test_seed_requires_items() {
        assert!(SeedArgs::try_parse_from(["fleet-seed", "UK"]).is_err());

        let args = SeedArgs::try_parse_from(["fleet-seed", "UK", "London", "Leeds"]).unwrap();
        assert_eq!(args.items, vec!["London", "Leeds"]);
    }

    #[test]
    fn test_help_is_not_a_usage_error() {
        let err = LaunchArgs::try_parse_from(["fleet-launch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
