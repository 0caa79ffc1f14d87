//! Time utilities for headroomd
//!
//! Everything the scheduler decides is keyed off local wall-clock time:
//! day-of-week masks, daily windows that may wrap midnight, quota anchors
//! and cooldown timestamps.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `HEADROOM_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising catch-up windows and midnight rollover without
//! waiting for the real clock.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 02:00:00`)
//!
//! Example:
//! ```bash
//! HEADROOM_MOCK_TIME="2025-12-25 02:00:00" headroomd -c dev.toml
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "HEADROOM_MOCK_TIME";

/// Offset between mock time and real time, captured once at first use so
/// mock time keeps advancing with the real clock.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // Internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => match Local.from_local_datetime(&naive_dt).single() {
                        Some(mock_dt) => {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        None => {
                            tracing::warn!(
                                mock_time = %mock_time_str,
                                "Failed to convert mock time to local timezone"
                            );
                        }
                    },
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Time of day with minute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub const MIDNIGHT: WallClock = WallClock { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse `HH:MM`. Single-digit hours are accepted (`8:05`).
    pub fn parse_hhmm(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        let hour: u8 = h.trim().parse().ok()?;
        let minute: u8 = m.trim().parse().ok()?;
        Self::new(hour, minute)
    }

    /// The wall-clock minute of `dt`; seconds are dropped.
    pub fn of(dt: &DateTime<Local>) -> Self {
        Self {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
        }
    }

    pub fn minutes_from_midnight(&self) -> u16 {
        (self.hour as u16) * 60 + self.minute as u16
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight()
            .cmp(&other.minutes_from_midnight())
    }
}

/// Days of the week mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const MONDAY: u8 = 1 << 0;
    pub const TUESDAY: u8 = 1 << 1;
    pub const WEDNESDAY: u8 = 1 << 2;
    pub const THURSDAY: u8 = 1 << 3;
    pub const FRIDAY: u8 = 1 << 4;
    pub const SATURDAY: u8 = 1 << 5;
    pub const SUNDAY: u8 = 1 << 6;

    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(
        Self::MONDAY | Self::TUESDAY | Self::WEDNESDAY | Self::THURSDAY | Self::FRIDAY,
    );
    pub const WEEKENDS: DaysOfWeek = DaysOfWeek(Self::SATURDAY | Self::SUNDAY);
    pub const ALL_DAYS: DaysOfWeek = DaysOfWeek(0x7F);
    pub const NONE: DaysOfWeek = DaysOfWeek(0);

    pub fn new(mask: u8) -> Self {
        Self(mask & 0x7F)
    }

    pub fn bit(weekday: Weekday) -> u8 {
        match weekday {
            Weekday::Mon => Self::MONDAY,
            Weekday::Tue => Self::TUESDAY,
            Weekday::Wed => Self::WEDNESDAY,
            Weekday::Thu => Self::THURSDAY,
            Weekday::Fri => Self::FRIDAY,
            Weekday::Sat => Self::SATURDAY,
            Weekday::Sun => Self::SUNDAY,
        }
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        (self.0 & Self::bit(weekday)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn mask(&self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for DaysOfWeek {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// How the end of a [`DailyWindow`] is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowBounds {
    /// `start <= t <= end`; a window whose start equals its end is open for that minute only
    Inclusive,
    /// `start <= t < end`; a window whose start equals its end is open all day
    HalfOpen,
}

/// A time-of-day window, repeated every day, that may wrap midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWindow {
    pub start: WallClock,
    pub end: WallClock,
    pub bounds: WindowBounds,
}

impl DailyWindow {
    /// Open from 00:00 through 23:59 inclusive.
    pub const ALWAYS: DailyWindow = DailyWindow {
        start: WallClock { hour: 0, minute: 0 },
        end: WallClock { hour: 23, minute: 59 },
        bounds: WindowBounds::Inclusive,
    };

    pub fn inclusive(start: WallClock, end: WallClock) -> Self {
        Self { start, end, bounds: WindowBounds::Inclusive }
    }

    pub fn half_open(start: WallClock, end: WallClock) -> Self {
        Self { start, end, bounds: WindowBounds::HalfOpen }
    }

    /// Whether the window wraps past midnight (e.g. 22:00 - 06:00)
    pub fn wraps_midnight(&self) -> bool {
        match self.bounds {
            WindowBounds::Inclusive => self.start > self.end,
            WindowBounds::HalfOpen => self.start >= self.end,
        }
    }

    pub fn contains(&self, t: WallClock) -> bool {
        match (self.bounds, self.wraps_midnight()) {
            (WindowBounds::Inclusive, false) => t >= self.start && t <= self.end,
            (WindowBounds::Inclusive, true) => t >= self.start || t <= self.end,
            (WindowBounds::HalfOpen, false) => t >= self.start && t < self.end,
            (WindowBounds::HalfOpen, true) => t >= self.start || t < self.end,
        }
    }

    pub fn contains_time(&self, dt: &DateTime<Local>) -> bool {
        self.contains(WallClock::of(dt))
    }
}

impl fmt::Display for DailyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
