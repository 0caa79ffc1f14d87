//! Audit event types

use chrono::{DateTime, Local};
use headroom_util::LoadId;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Policy loaded/reloaded
    PolicyLoaded { load_count: usize },

    /// Load commanded on
    LoadStarted {
        load_id: LoadId,
        reason: String,
        headroom_w: Option<i64>,
    },

    /// Load commanded off
    LoadStopped {
        load_id: LoadId,
        reason: String,
        ran_secs: u64,
    },

    /// A power command failed; state was left as it was
    ActuationFailed {
        load_id: LoadId,
        on: bool,
        error: String,
    },

    /// Quota window advanced
    QuotaRollover { load_id: LoadId, windows: u32 },

    /// Device state changed outside the scheduler
    ExternalStateChange { load_id: LoadId, running: bool },

    /// No headroom reading; running loads were shed
    HeadroomUnavailable { running_loads: usize },

    /// Client connected
    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self::at(event, headroom_util::now())
    }

    /// Event stamped with an explicit time (the scheduler's tick time)
    pub fn at(event: AuditEventType, timestamp: DateTime<Local>) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp,
            event,
        }
    }
}
