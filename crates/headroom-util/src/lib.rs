//! Shared utilities for headroomd
//!
//! This crate provides:
//! - ID types (LoadId, ClientId)
//! - Wall-clock time, day-of-week masks and daily windows
//! - Watt parsing for sensor readings
//! - Error types
//! - Rate limiting helpers
//! - Default paths for config, socket, and data directories

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;
mod watts;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
pub use watts::*;
