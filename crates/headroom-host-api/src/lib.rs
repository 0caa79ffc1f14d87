//! Host interfaces for headroomd
//!
//! This crate defines the seam between the scheduler core and the outside
//! world: where headroom readings come from and how loads are switched. It
//! contains no platform code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
