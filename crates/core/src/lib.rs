pub mod compute;
pub mod config;
pub mod controller;
pub mod inventory;
pub mod launcher;
pub mod metrics;
pub mod payload;
pub mod status;
pub mod testing;

pub use compute::{
    ComputeError, ComputeProvider, InstanceFilter, InstanceId, InstanceRole, InstanceState,
    LocalProcessProvider, WorkerInstance,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, ComputeBackend,
    Config, ConfigError, LogFormat,
};
pub use controller::{
    Controller, ControllerConfig, ControllerError, ControllerOutcome, ControllerStatus,
};
pub use inventory::WorkerInventory;
pub use launcher::{BootConfig, LaunchError, WorkerLauncher};
pub use payload::{
    PageProbe, PayloadOutcome, ScrapeTask, SelfTermination, WorkerConfig, WorkerPayload,
};
pub use status::{GroupStats, ItemStatus, SqliteStatusStore, StatusError, StatusStore, WorkItem};
