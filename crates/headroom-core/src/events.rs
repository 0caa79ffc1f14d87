//! Core events emitted by the scheduler

use headroom_api::{StartReason, StopReason};
use headroom_util::LoadId;

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Load commanded on
    LoadStarted {
        load_id: LoadId,
        reason: StartReason,
        headroom_w: Option<i64>,
    },

    /// Load commanded off
    LoadStopped {
        load_id: LoadId,
        reason: StopReason,
        ran_secs: u64,
    },

    /// On/off command failed; state left as it was
    ActuationFailed {
        load_id: LoadId,
        on: bool,
        error: String,
    },

    /// Quota window advanced
    QuotaRolledOver {
        load_id: LoadId,
        windows: u32,
    },

    /// Device state changed outside the scheduler
    ExternalStateChanged {
        load_id: LoadId,
        running: bool,
    },

    /// No headroom reading this tick
    HeadroomUnavailable {
        running_loads: usize,
    },

    /// Policy was reloaded
    PolicyReloaded {
        load_count: usize,
    },
}
