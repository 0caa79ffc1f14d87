//! Per-load run state transitions

use chrono::{DateTime, Local, NaiveDate};

/// Whether a load is on, and the timestamps that gate its next change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    /// Source of truth for scheduling decisions
    pub is_running: bool,
    /// Set on OFF -> ON
    pub start_ts: Option<DateTime<Local>>,
    /// Set on ON -> OFF
    pub cooldown_start: Option<DateTime<Local>>,
    pub catchup_active: bool,
    /// Runtime accrued while `catchup_active` was set
    pub catchup_run_secs: u64,
    pub run_today_secs: u64,
    /// Local date `run_today_secs` belongs to
    pub today: Option<NaiveDate>,
}

impl RunState {
    pub fn mark_started(&mut self, now: DateTime<Local>) {
        self.is_running = true;
        self.start_ts = Some(now);
    }

    pub fn mark_stopped(&mut self, now: DateTime<Local>) {
        self.is_running = false;
        self.start_ts = None;
        self.cooldown_start = Some(now);
        self.catchup_active = false;
    }

    /// Correct the running flag from an observed device state. Cooldown and
    /// timestamps are left alone. Returns true when the flag changed.
    pub fn reconcile(&mut self, observed_on: bool) -> bool {
        if self.is_running == observed_on {
            return false;
        }
        self.is_running = observed_on;
        true
    }

    /// Seconds since the last start, 0 when not started by the scheduler
    pub fn ran_secs(&self, now: DateTime<Local>) -> u64 {
        self.start_ts
            .map(|ts| (now - ts).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// A load with no recorded start time counts as having met its minimum
    pub fn min_runtime_met(&self, min_runtime_mins: u32, now: DateTime<Local>) -> bool {
        if min_runtime_mins == 0 {
            return true;
        }
        match self.start_ts {
            Some(ts) => now - ts >= chrono::Duration::minutes(min_runtime_mins as i64),
            None => true,
        }
    }

    pub fn cooldown_met(&self, cooldown_mins: u32, now: DateTime<Local>) -> bool {
        if cooldown_mins == 0 || self.is_running {
            return true;
        }
        match self.cooldown_start {
            Some(ts) => now - ts >= chrono::Duration::minutes(cooldown_mins as i64),
            None => true,
        }
    }

    pub fn cooldown_until(&self, cooldown_mins: u32) -> Option<DateTime<Local>> {
        if cooldown_mins == 0 || self.is_running {
            return None;
        }
        self.cooldown_start
            .map(|ts| ts + chrono::Duration::minutes(cooldown_mins as i64))
    }

    /// Reset the daily counters when the local date changes. Returns true
    /// when a rollover happened.
    ///
    /// A catch-up run in progress keeps its flag; windows may span midnight.
    pub fn maybe_daily_rollover(&mut self, today: NaiveDate) -> bool {
        if self.today == Some(today) {
            return false;
        }
        self.today = Some(today);
        self.run_today_secs = 0;
        self.catchup_run_secs = 0;
        true
    }

    /// Credit one tick of runtime to the daily and catch-up counters
    pub fn accrue(&mut self, secs: u64) {
        self.run_today_secs = self.run_today_secs.saturating_add(secs);
        if self.catchup_active {
            self.catchup_run_secs = self.catchup_run_secs.saturating_add(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn start_stop_transitions() {
        let mut run = RunState::default();
        run.mark_started(at(10, 0));
        assert!(run.is_running);
        assert_eq!(run.start_ts, Some(at(10, 0)));
        assert_eq!(run.ran_secs(at(10, 5)), 300);

        run.catchup_active = true;
        run.mark_stopped(at(10, 30));
        assert!(!run.is_running);
        assert!(run.start_ts.is_none());
        assert_eq!(run.cooldown_start, Some(at(10, 30)));
        assert!(!run.catchup_active);
    }

    #[test]
    fn reconcile_only_flips_running() {
        let mut run = RunState::default();
        run.mark_stopped(at(9, 0));

        assert!(run.reconcile(true));
        assert!(run.is_running);
        assert!(run.start_ts.is_none());
        assert_eq!(run.cooldown_start, Some(at(9, 0)));
        assert!(!run.reconcile(true));
    }

    #[test]
    fn min_runtime_protection() {
        let mut run = RunState::default();
        assert!(run.min_runtime_met(10, at(10, 0)));

        run.mark_started(at(10, 0));
        assert!(!run.min_runtime_met(10, at(10, 9)));
        assert!(run.min_runtime_met(10, at(10, 10)));
        assert!(run.min_runtime_met(0, at(10, 0)));
    }

    #[test]
    fn cooldown_gates_restart() {
        let mut run = RunState::default();
        assert!(run.cooldown_met(5, at(10, 0)));

        run.mark_started(at(9, 0));
        run.mark_stopped(at(10, 0));
        assert!(!run.cooldown_met(5, at(10, 4)));
        assert!(run.cooldown_met(5, at(10, 5)));
        assert_eq!(run.cooldown_until(5), Some(at(10, 5)));
        assert_eq!(run.cooldown_until(0), None);
    }

    #[test]
    fn daily_rollover_resets_counters() {
        let mut run = RunState::default();
        let day = at(0, 0).date_naive();
        assert!(run.maybe_daily_rollover(day));

        run.catchup_active = true;
        run.accrue(60);
        assert_eq!(run.run_today_secs, 60);
        assert_eq!(run.catchup_run_secs, 60);
        assert!(!run.maybe_daily_rollover(day));

        assert!(run.maybe_daily_rollover(day.succ_opt().unwrap()));
        assert_eq!(run.run_today_secs, 0);
        assert_eq!(run.catchup_run_secs, 0);
        // An overnight catch-up run carries on past the date change
        assert!(run.catchup_active);
    }
}
