//! Compute instance provider abstraction.
//!
//! This module provides a `ComputeProvider` trait for creating, listing and
//! terminating the short-lived instances that run workers and controllers.

mod local;
mod types;

pub use local::LocalProcessProvider;
pub use types::*;
