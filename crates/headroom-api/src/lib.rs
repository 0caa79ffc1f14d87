//! Protocol types for headroomd
//!
//! This crate defines the types shared between the scheduler, its host
//! adapters and IPC clients:
//! - Load control and sensor specifications
//! - Per-tick report rows and load views
//! - Commands (requests from clients), responses
//! - Events (service -> clients)

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
