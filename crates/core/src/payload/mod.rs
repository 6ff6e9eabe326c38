//! Worker payload.
//!
//! Runs inside a worker instance: performs the scrape task for one
//! `(group, item)`, records the terminal status and terminates the instance.

mod config;
mod runner;
mod task;

pub use config::WorkerConfig;
pub use runner::{PayloadOutcome, SelfTermination, WorkerPayload};
pub use task::{artifact_file_name, PageProbe, ScrapeTask, TaskError, TaskOutput};
