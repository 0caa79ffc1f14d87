//! Scheduling core for headroomd
//!
//! This crate decides, once per tick, which loads run:
//! - Rolling quota windows and per-load run state
//! - Day/time/quota eligibility and fairness ordering
//! - Catch-up runs inside a fallback window
//! - Surplus starts, hysteresis stops and emergency shedding
//! - The per-tick report table

pub mod catchup;
pub mod eligibility;
mod events;
mod quota;
mod report;
mod run_state;
mod scheduler;
mod state;

pub use catchup::{CatchupBudget, CatchupDecision};
pub use events::*;
pub use quota::*;
pub use report::*;
pub use run_state::*;
pub use scheduler::*;
pub use state::*;

