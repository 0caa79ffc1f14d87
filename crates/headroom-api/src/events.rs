//! Event types for headroomd -> client streaming

use chrono::{DateTime, Local};
use headroom_util::LoadId;
use serde::{Deserialize, Serialize};

use crate::{StartReason, StopReason, TickReport, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: headroom_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A scheduler tick finished
    TickCompleted(TickReport),

    LoadStarted {
        load_id: LoadId,
        reason: StartReason,
        headroom_w: Option<i64>,
    },

    LoadStopped {
        load_id: LoadId,
        reason: StopReason,
        /// How long the load ran, if the start time was known
        ran_secs: Option<u64>,
    },

    QuotaRolledOver {
        load_id: LoadId,
        windows: u32,
    },

    /// A monitored device changed state without a scheduler command
    ExternalStateChanged {
        load_id: LoadId,
        running: bool,
    },

    /// No headroom reading; all running loads were shed
    HeadroomUnavailable,

    PolicyReloaded {
        load_count: usize,
    },

    /// Service is shutting down
    Shutdown,
}
