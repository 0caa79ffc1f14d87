//! Store trait definitions

use chrono::{DateTime, Local, NaiveDate};
use headroom_util::LoadId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Load state

    /// Insert or replace the saved state of one load
    fn save_load_snapshot(&self, snapshot: &LoadSnapshot) -> StoreResult<()>;

    /// Saved state of one load, if any
    fn load_snapshot(&self, load_id: &LoadId) -> StoreResult<Option<LoadSnapshot>>;

    /// Every saved load state
    fn load_all_snapshots(&self) -> StoreResult<Vec<LoadSnapshot>>;

    // Daily runtime history

    /// Add runtime for a load on a specific local day
    fn add_daily_runtime(&self, load_id: &LoadId, day: NaiveDate, runtime: Duration)
        -> StoreResult<()>;

    /// Total runtime recorded for a load on a specific local day
    fn get_daily_runtime(&self, load_id: &LoadId, day: NaiveDate) -> StoreResult<Duration>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Persisted quota and run state of one load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSnapshot {
    pub load_id: LoadId,
    /// Start of the current quota window
    pub quota_anchor: Option<DateTime<Local>>,
    pub served_mins: u32,
    /// Runtime shown for the current window
    pub window_runtime_mins: u32,
    pub is_running: bool,
    pub start_ts: Option<DateTime<Local>>,
    pub cooldown_start: Option<DateTime<Local>>,
    pub catchup_active: bool,
    pub catchup_run_secs: u64,
    pub run_today_secs: u64,
    /// Local date `run_today_secs` belongs to
    pub today: Option<NaiveDate>,
    pub last_reason: Option<String>,
    pub updated_at: DateTime<Local>,
}

impl LoadSnapshot {
    /// A snapshot with nothing served and nothing running
    pub fn empty(load_id: LoadId, updated_at: DateTime<Local>) -> Self {
        Self {
            load_id,
            quota_anchor: None,
            served_mins: 0,
            window_runtime_mins: 0,
            is_running: false,
            start_ts: None,
            cooldown_start: None,
            catchup_active: false,
            catchup_run_secs: 0,
            run_today_secs: 0,
            today: None,
            last_reason: None,
            updated_at,
        }
    }
}
