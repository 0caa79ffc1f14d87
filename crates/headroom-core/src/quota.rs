//! Rolling-window runtime bookkeeping

use chrono::{DateTime, Local};
use headroom_config::QuotaWindow;
use std::time::Duration;

/// Minutes credited to each running load per tick: the tick length rounded
/// to the nearest minute, never less than one.
pub fn tick_quantum_minutes(period: Duration) -> u32 {
    let mins = (period.as_secs_f64() / 60.0).round();
    if mins < 1.0 { 1 } else { mins as u32 }
}

/// Runtime served by one load in its current quota window
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaState {
    /// Start of the current window
    pub anchor: DateTime<Local>,
    /// Never decreases within a window
    pub served_mins: u32,
    /// Runtime shown for the current window
    pub window_runtime_mins: u32,
}

impl QuotaState {
    pub fn new(anchor: DateTime<Local>) -> Self {
        Self {
            anchor,
            served_mins: 0,
            window_runtime_mins: 0,
        }
    }

    /// `max(0, target - served)`; a target of 0 leaves nothing to serve
    pub fn remaining(&self, target_mins: u32) -> u32 {
        target_mins.saturating_sub(self.served_mins)
    }

    pub fn accrue(&mut self, mins: u32) {
        self.served_mins = self.served_mins.saturating_add(mins);
        self.window_runtime_mins = self.window_runtime_mins.saturating_add(mins);
    }

    /// Advance the anchor by every whole window that has elapsed and reset
    /// the counters. Returns the number of windows skipped.
    ///
    /// The anchor moves in whole window lengths so the window keeps its phase.
    pub fn maybe_rollover(&mut self, window: QuotaWindow, now: DateTime<Local>) -> u32 {
        let elapsed_mins = (now - self.anchor).num_minutes();
        let window_mins = window.minutes() as i64;
        if elapsed_mins < window_mins {
            return 0;
        }

        let windows = elapsed_mins / window_mins;
        self.anchor = self.anchor + chrono::Duration::minutes(windows * window_mins);
        self.served_mins = 0;
        self.window_runtime_mins = 0;
        windows.clamp(0, u32::MAX as i64) as u32
    }

    pub fn next_rollover(&self, window: QuotaWindow) -> DateTime<Local> {
        self.anchor + window.length()
    }

    /// `round(served / target * 100)` clamped to 0..=100; 0 without a target
    pub fn progress_pct(&self, target_mins: u32) -> u8 {
        if target_mins == 0 {
            return 0;
        }
        let pct = (self.served_mins as f64 / target_mins as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
    }

    #[test]
    fn quantum_rounds_to_minutes() {
        assert_eq!(tick_quantum_minutes(Duration::from_secs(60)), 1);
        assert_eq!(tick_quantum_minutes(Duration::from_secs(20)), 1);
        assert_eq!(tick_quantum_minutes(Duration::from_secs(89)), 1);
        assert_eq!(tick_quantum_minutes(Duration::from_secs(90)), 2);
        assert_eq!(tick_quantum_minutes(Duration::from_secs(300)), 5);
    }

    #[test]
    fn rollover_is_idempotent_within_a_window() {
        let mut quota = QuotaState::new(at(10, 6, 0));
        quota.accrue(25);

        for now in [at(10, 6, 0), at(10, 18, 0), at(11, 5, 59)] {
            assert_eq!(quota.maybe_rollover(QuotaWindow::Hours24, now), 0);
            assert_eq!(quota.served_mins, 25);
        }
    }

    #[test]
    fn rollover_preserves_phase() {
        let mut quota = QuotaState::new(at(10, 6, 0));
        quota.accrue(40);

        // Three whole windows and a bit
        let windows = quota.maybe_rollover(QuotaWindow::Hours24, at(13, 9, 30));
        assert_eq!(windows, 3);
        assert_eq!(quota.anchor, at(13, 6, 0));
        assert_eq!(quota.served_mins, 0);
        assert_eq!(quota.window_runtime_mins, 0);
        assert_eq!(quota.next_rollover(QuotaWindow::Hours24), at(14, 6, 0));
    }

    #[test]
    fn rollover_after_exactly_one_window() {
        let mut quota = QuotaState::new(at(10, 6, 0));
        quota.accrue(10);
        assert_eq!(quota.maybe_rollover(QuotaWindow::Hours12, at(10, 18, 0)), 1);
        assert_eq!(quota.anchor, at(10, 18, 0));
    }

    #[test]
    fn anchor_in_the_future_never_rolls() {
        let mut quota = QuotaState::new(at(12, 0, 0));
        quota.accrue(5);
        assert_eq!(quota.maybe_rollover(QuotaWindow::Hours12, at(10, 0, 0)), 0);
        assert_eq!(quota.served_mins, 5);
    }

    #[test]
    fn remaining_and_progress() {
        let mut quota = QuotaState::new(at(10, 0, 0));
        assert_eq!(quota.remaining(60), 60);
        assert_eq!(quota.remaining(0), 0);

        quota.accrue(45);
        assert_eq!(quota.remaining(60), 15);
        assert_eq!(quota.progress_pct(60), 75);
        assert_eq!(quota.progress_pct(0), 0);

        quota.accrue(30);
        assert_eq!(quota.remaining(60), 0);
        assert_eq!(quota.progress_pct(60), 100);
    }
}
