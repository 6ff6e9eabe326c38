use std::process::{Command, Output};

fn run(bin: &str, args: &[&str]) -> Output {
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "error")
        .env_remove("SCRAPEFLEET_CONFIG")
        .output()
        .expect("Failed to run binary")
}

#[test]
fn test_controller_without_group_prints_usage() {
    let output = run(env!("CARGO_BIN_EXE_fleetctl"), &[]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
}

#[test]
fn test_controller_with_extra_argument_prints_usage() {
    let output = run(env!("CARGO_BIN_EXE_fleetctl"), &["UK", "FR"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_worker_requires_group_and_item() {
    let output = run(env!("CARGO_BIN_EXE_fleet-worker"), &["UK"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
}

#[test]
fn test_seed_requires_items() {
    let output = run(env!("CARGO_BIN_EXE_fleet-seed"), &["UK"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_help_exits_cleanly() {
    let output = run(env!("CARGO_BIN_EXE_fleet-launch"), &["--help"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fleet-launch"));
}

#[test]
fn test_missing_config_file_is_fatal() {
    let output = Command::new(env!("CARGO_BIN_EXE_fleetctl"))
        .arg("UK")
        .env("SCRAPEFLEET_CONFIG", "/nonexistent/scrapefleet.toml")
        .output()
        .expect("Failed to run binary");
    assert_eq!(output.status.code(), Some(1));
}
