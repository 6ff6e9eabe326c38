//! Shared plumbing for the scrapefleet binaries.

pub mod args;
pub mod bootstrap;
pub mod http;
pub mod metrics;
pub mod shutdown;
pub mod telemetry;
