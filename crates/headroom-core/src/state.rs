//! Scheduler-owned state of one load and its persisted form

use chrono::{DateTime, Local};
use headroom_config::LoadPolicy;
use headroom_store::LoadSnapshot;

use crate::{QuotaState, RunState};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadState {
    pub quota: QuotaState,
    pub run: RunState,
    pub last_reason: Option<String>,
}

impl LoadState {
    /// First observation of a load: window anchored now, nothing served
    pub fn fresh(now: DateTime<Local>) -> Self {
        Self {
            quota: QuotaState::new(now),
            run: RunState {
                today: Some(now.date_naive()),
                ..Default::default()
            },
            last_reason: None,
        }
    }

    /// Rebuild state from a saved snapshot.
    ///
    /// Served minutes above the target are clamped to it, and a window that
    /// is already full is re-anchored at `now` so it does not roll over on
    /// the first tick.
    pub fn hydrate(snapshot: LoadSnapshot, load: &LoadPolicy, now: DateTime<Local>) -> Self {
        let target = load.target_mins;
        let mut anchor = snapshot.quota_anchor.unwrap_or(now);
        let mut served = snapshot.served_mins;

        if target > 0 && served >= target {
            served = target;
            anchor = now;
        }

        Self {
            quota: QuotaState {
                anchor,
                served_mins: served,
                window_runtime_mins: snapshot.window_runtime_mins.min(served),
            },
            run: RunState {
                is_running: snapshot.is_running,
                start_ts: snapshot.start_ts,
                cooldown_start: snapshot.cooldown_start,
                catchup_active: snapshot.catchup_active,
                catchup_run_secs: snapshot.catchup_run_secs,
                run_today_secs: snapshot.run_today_secs,
                today: snapshot.today.or(Some(now.date_naive())),
            },
            last_reason: snapshot.last_reason,
        }
    }

    pub fn to_snapshot(&self, load: &LoadPolicy, now: DateTime<Local>) -> LoadSnapshot {
        LoadSnapshot {
            load_id: load.id.clone(),
            quota_anchor: Some(self.quota.anchor),
            served_mins: self.quota.served_mins,
            window_runtime_mins: self.quota.window_runtime_mins,
            is_running: self.run.is_running,
            start_ts: self.run.start_ts,
            cooldown_start: self.run.cooldown_start,
            catchup_active: self.run.catchup_active,
            catchup_run_secs: self.run.catchup_run_secs,
            run_today_secs: self.run.run_today_secs,
            today: self.run.today,
            last_reason: self.last_reason.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use headroom_api::LoadControl;
    use headroom_util::LoadId;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    fn pump(target: u32) -> LoadPolicy {
        let mut load = LoadPolicy::new(
            "pump",
            1,
            1000,
            LoadControl::CommandGroup { on: vec!["on".into()], off: vec!["off".into()] },
        );
        load.target_mins = target;
        load
    }

    #[test]
    fn hydrate_clamps_served_and_refreshes_anchor() {
        let mut snapshot = LoadSnapshot::empty(LoadId::new("pump"), at(8, 0));
        snapshot.quota_anchor = Some(at(1, 0));
        snapshot.served_mins = 75;
        snapshot.window_runtime_mins = 80;

        let state = LoadState::hydrate(snapshot, &pump(60), at(9, 0));
        assert_eq!(state.quota.served_mins, 60);
        assert_eq!(state.quota.window_runtime_mins, 60);
        assert_eq!(state.quota.anchor, at(9, 0));
    }

    #[test]
    fn hydrate_keeps_partial_progress() {
        let mut snapshot = LoadSnapshot::empty(LoadId::new("pump"), at(8, 0));
        snapshot.quota_anchor = Some(at(1, 0));
        snapshot.served_mins = 20;
        snapshot.window_runtime_mins = 35;
        snapshot.is_running = true;
        snapshot.start_ts = Some(at(7, 40));

        let state = LoadState::hydrate(snapshot, &pump(60), at(9, 0));
        assert_eq!(state.quota.served_mins, 20);
        assert_eq!(state.quota.window_runtime_mins, 20);
        assert_eq!(state.quota.anchor, at(1, 0));
        assert!(state.run.is_running);
        assert_eq!(state.run.start_ts, Some(at(7, 40)));
    }

    #[test]
    fn missing_anchor_is_set_to_now() {
        let snapshot = LoadSnapshot::empty(LoadId::new("pump"), at(8, 0));
        let state = LoadState::hydrate(snapshot, &pump(60), at(9, 0));
        assert_eq!(state.quota.anchor, at(9, 0));
    }

    #[test]
    fn snapshot_round_trip_preserves_state() {
        let load = pump(60);
        let mut state = LoadState::fresh(at(6, 0));
        state.quota.accrue(12);
        state.run.mark_started(at(8, 48));
        state.last_reason = Some("Start ok".into());

        let snapshot = state.to_snapshot(&load, at(9, 0));
        assert_eq!(snapshot.updated_at, at(9, 0));
        assert_eq!(LoadState::hydrate(snapshot, &load, at(9, 0)), state);
    }
}
