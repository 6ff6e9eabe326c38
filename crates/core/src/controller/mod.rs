//! Group controller.
//!
//! One controller supervises one group. On a fixed interval it reconciles
//! the status table against the live worker inventory:
//! - **Completion**: N consecutive all-complete snapshots plus an empty
//!   inventory end the run and terminate the controller's own instance
//! - **Capacity fill**: free slots up to `max_instances` are filled with
//!   PENDING items, claimed before their worker is launched

mod config;
mod runner;
mod types;

pub use config::ControllerConfig;
pub use runner::Controller;
pub use types::{
    ControllerError, ControllerOutcome, ControllerStatus, CycleReport, FailedLaunch,
    LaunchedWorker,
};
