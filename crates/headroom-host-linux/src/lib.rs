//! Linux host adapter for headroomd
//!
//! Provides:
//! - Load actuation by running configured commands in their own process group
//! - Device state queries with logical inversion
//! - Sensor reading (files, commands, fixed values) and headroom derivation
//! - The telemetry refresh loop

mod adapter;
mod process;
mod telemetry;

pub use adapter::*;
pub use process::*;
pub use telemetry::*;
