//! Validated policy structures

use crate::schema::{RawCatchup, RawConfig, RawControl, RawLoad, RawOverride, RawServiceConfig, RawTelemetry};
use crate::validation::{parse_days, parse_quota_window, parse_time, Severity, ValidationError};
use headroom_api::{DeviceControl, HeadroomMode, LoadControl, SensorSource};
use headroom_util::{DailyWindow, DaysOfWeek, LoadId, WallClock};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIER: u8 = 2;
pub const DEFAULT_MAX_CONCURRENT: usize = 2;
pub const MAX_CONCURRENT_LIMIT: usize = 32;
pub const DEFAULT_START_MARGIN_PCT: f64 = 20.0;
pub const DEFAULT_KEEP_MARGIN_PCT: f64 = 5.0;
pub const DEFAULT_SURGE_MULTIPLIER: f64 = 1.2;
pub const DEFAULT_SHED_HYSTERESIS_W: i64 = 100;
pub const DEFAULT_REFRESH_SECS: u64 = 30;

/// Validated policy ready for use by the scheduler
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub service: ServicePolicy,
    pub telemetry: TelemetryPolicy,

    /// Loads that passed validation
    pub loads: Vec<LoadPolicy>,

    /// Non-fatal issues found while validating (warnings and excluded loads)
    pub issues: Vec<ValidationError>,
}

impl Policy {
    /// Convert from raw config. Loads with load-level errors in `issues` are left out.
    pub fn from_raw(raw: RawConfig, issues: Vec<ValidationError>) -> Self {
        let excluded: HashSet<&str> = issues
            .iter()
            .filter(|e| e.severity() == Severity::LoadExcluded)
            .filter_map(|e| e.load_id())
            .collect();

        let loads = raw
            .loads
            .into_iter()
            .filter(|l| !excluded.contains(l.id.as_str()))
            .map(LoadPolicy::from_raw)
            .collect();

        Self {
            service: ServicePolicy::from_raw(raw.service),
            telemetry: TelemetryPolicy::from_raw(raw.telemetry),
            loads,
            issues,
        }
    }

    /// Get load by ID
    pub fn get_load(&self, id: &LoadId) -> Option<&LoadPolicy> {
        self.loads.iter().find(|l| &l.id == id)
    }

    /// IDs of loads left out because of load-level errors
    pub fn excluded_loads(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .issues
            .iter()
            .filter(|e| e.severity() == Severity::LoadExcluded)
            .filter_map(|e| e.load_id())
            .collect();
        ids.dedup();
        ids
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationError> {
        self.issues.iter().filter(|e| e.severity() == Severity::Warning)
    }
}

/// Service settings
#[derive(Debug, Clone)]
pub struct ServicePolicy {
    pub socket_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub tick_period: Duration,
    pub max_concurrent_loads: usize,
    pub shed_on_exit: bool,
}

impl ServicePolicy {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let tick_mins = raw
            .tick_period_mins
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(1.0);
        let max_concurrent = raw
            .max_concurrent_loads
            .map(|n| n.clamp(1, MAX_CONCURRENT_LIMIT as i64) as usize)
            .unwrap_or(DEFAULT_MAX_CONCURRENT);

        Self {
            socket_path: raw.socket_path,
            data_dir: raw.data_dir,
            tick_period: Duration::from_secs_f64(tick_mins * 60.0),
            max_concurrent_loads: max_concurrent,
            shed_on_exit: raw.shed_on_exit,
        }
    }
}

impl Default for ServicePolicy {
    fn default() -> Self {
        Self {
            socket_path: None,
            data_dir: None,
            tick_period: Duration::from_secs(60),
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT,
            shed_on_exit: false,
        }
    }
}

/// Fixed readings that replace sensor values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingOverride {
    pub pv_w: Option<f64>,
    pub consumption_w: Option<f64>,
    pub battery_w: Option<f64>,
    pub grid_w: Option<f64>,
    pub use_grid: bool,
}

impl From<RawOverride> for ReadingOverride {
    fn from(raw: RawOverride) -> Self {
        Self {
            pv_w: raw.pv_w,
            consumption_w: raw.consumption_w,
            battery_w: raw.battery_w,
            grid_w: raw.grid_w,
            use_grid: raw.use_grid,
        }
    }
}

/// Telemetry sources and derivation mode
#[derive(Debug, Clone)]
pub struct TelemetryPolicy {
    pub mode: HeadroomMode,
    pub refresh: Duration,
    pub pv: Option<SensorSource>,
    pub consumption: Option<SensorSource>,
    pub battery: Option<SensorSource>,
    pub grid: Option<SensorSource>,
    pub override_values: Option<ReadingOverride>,
}

impl TelemetryPolicy {
    fn from_raw(raw: RawTelemetry) -> Self {
        let mode = match raw.mode.as_deref().map(str::to_lowercase).as_deref() {
            Some("grid") => HeadroomMode::Grid,
            _ => HeadroomMode::Balance,
        };
        Self {
            mode,
            refresh: Duration::from_secs(
                raw.refresh_secs.filter(|s| *s > 0).unwrap_or(DEFAULT_REFRESH_SECS),
            ),
            pv: raw.pv,
            consumption: raw.consumption,
            battery: raw.battery,
            grid: raw.grid,
            override_values: raw.override_values.map(ReadingOverride::from),
        }
    }
}

impl Default for TelemetryPolicy {
    fn default() -> Self {
        Self {
            mode: HeadroomMode::Balance,
            refresh: Duration::from_secs(DEFAULT_REFRESH_SECS),
            pv: None,
            consumption: None,
            battery: None,
            grid: None,
            override_values: None,
        }
    }
}

/// Rolling window over which a load's runtime target applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotaWindow {
    Hours12,
    #[default]
    Hours24,
    Hours48,
    Hours72,
}

impl QuotaWindow {
    /// Unknown labels fall back to 24 hours
    pub fn parse(s: &str) -> Self {
        match parse_quota_window(s) {
            Some(720) => QuotaWindow::Hours12,
            Some(2880) => QuotaWindow::Hours48,
            Some(4320) => QuotaWindow::Hours72,
            _ => QuotaWindow::Hours24,
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            QuotaWindow::Hours12 => 12 * 60,
            QuotaWindow::Hours24 => 24 * 60,
            QuotaWindow::Hours48 => 48 * 60,
            QuotaWindow::Hours72 => 72 * 60,
        }
    }

    pub fn length(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.minutes() as i64)
    }
}

/// Catch-up guarantee for a load
#[derive(Debug, Clone, PartialEq)]
pub struct CatchupPolicy {
    pub enabled: bool,
    /// Minutes owed per quota window
    pub runtime_mins: u32,
    /// Half-open window in which catch-up may start
    pub window: DailyWindow,
}

impl CatchupPolicy {
    pub fn default_window() -> DailyWindow {
        DailyWindow::half_open(WallClock::MIDNIGHT, WallClock { hour: 6, minute: 0 })
    }

    /// Minutes owed, or 0 when catch-up is disabled
    pub fn target_mins(&self) -> u32 {
        if self.enabled { self.runtime_mins } else { 0 }
    }

    fn from_raw(raw: RawCatchup) -> Self {
        let default = Self::default_window();
        let start = raw.window_start.as_deref().map(parse_time);
        let end = raw.window_end.as_deref().map(parse_time);
        // Either bound malformed: the whole window reverts to the default
        let window = match (start, end) {
            (Some(Err(_)), _) | (_, Some(Err(_))) => default,
            (s, e) => DailyWindow::half_open(
                s.and_then(Result::ok).unwrap_or(default.start),
                e.and_then(Result::ok).unwrap_or(default.end),
            ),
        };
        let runtime_mins = raw.runtime_mins.max(0) as u32;

        Self {
            enabled: raw.enabled && runtime_mins > 0,
            runtime_mins,
            window,
        }
    }
}

impl Default for CatchupPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            runtime_mins: 0,
            window: Self::default_window(),
        }
    }
}

/// Validated load definition
#[derive(Debug, Clone, PartialEq)]
pub struct LoadPolicy {
    pub id: LoadId,
    pub label: String,
    /// 1 = highest priority
    pub tier: u8,
    pub rated_watts: u32,
    pub quota_window: QuotaWindow,
    /// Runtime target per quota window; 0 means the normal path never starts the load
    pub target_mins: u32,
    pub min_runtime_mins: u32,
    pub cooldown_mins: u32,
    pub start_margin_pct: f64,
    pub keep_margin_pct: f64,
    pub surge_multiplier: f64,
    pub shed_hysteresis_w: i64,
    pub days: DaysOfWeek,
    /// Inclusive time-of-day window
    pub window: DailyWindow,
    pub catchup: CatchupPolicy,
    pub control: LoadControl,
}

impl LoadPolicy {
    /// A load with every optional setting at its default
    pub fn new(id: impl Into<LoadId>, tier: u8, rated_watts: u32, control: LoadControl) -> Self {
        let id = id.into();
        Self {
            label: id.to_string(),
            id,
            tier,
            rated_watts,
            quota_window: QuotaWindow::default(),
            target_mins: 0,
            min_runtime_mins: 0,
            cooldown_mins: 0,
            start_margin_pct: DEFAULT_START_MARGIN_PCT,
            keep_margin_pct: DEFAULT_KEEP_MARGIN_PCT,
            surge_multiplier: DEFAULT_SURGE_MULTIPLIER,
            shed_hysteresis_w: DEFAULT_SHED_HYSTERESIS_W,
            days: DaysOfWeek::ALL_DAYS,
            window: DailyWindow::ALWAYS,
            catchup: CatchupPolicy::default(),
            control,
        }
    }

    fn from_raw(raw: RawLoad) -> Self {
        let days = match raw.days.as_ref().map(parse_days) {
            Some(Ok(mask)) if !mask.is_empty() => mask,
            _ => DaysOfWeek::ALL_DAYS,
        };

        let start = raw.window_start.as_deref().map(parse_time);
        let end = raw.window_end.as_deref().map(parse_time);
        let window = match (start, end) {
            (Some(Err(_)), _) | (_, Some(Err(_))) => DailyWindow::ALWAYS,
            (s, e) => DailyWindow::inclusive(
                s.and_then(Result::ok).unwrap_or(DailyWindow::ALWAYS.start),
                e.and_then(Result::ok).unwrap_or(DailyWindow::ALWAYS.end),
            ),
        };

        let id = LoadId::new(raw.id);
        Self {
            label: raw.label.unwrap_or_else(|| id.to_string()),
            id,
            tier: raw.tier.map(|t| t.clamp(1, 4) as u8).unwrap_or(DEFAULT_TIER),
            rated_watts: raw.rated_watts.clamp(0, u32::MAX as i64) as u32,
            quota_window: raw
                .quota_window
                .as_deref()
                .map(QuotaWindow::parse)
                .unwrap_or_default(),
            target_mins: non_negative_mins(raw.max_runtime_per_quota_mins),
            min_runtime_mins: non_negative_mins(raw.min_runtime_mins),
            cooldown_mins: non_negative_mins(raw.cooldown_mins),
            start_margin_pct: raw
                .start_margin_pct
                .filter(|m| *m >= 0.0)
                .unwrap_or(DEFAULT_START_MARGIN_PCT),
            keep_margin_pct: raw
                .keep_margin_pct
                .filter(|m| *m >= 0.0)
                .unwrap_or(DEFAULT_KEEP_MARGIN_PCT),
            surge_multiplier: raw
                .surge_multiplier
                .filter(|s| *s >= 1.0)
                .unwrap_or(DEFAULT_SURGE_MULTIPLIER),
            shed_hysteresis_w: raw
                .shed_hysteresis_w
                .filter(|h| *h >= 0)
                .unwrap_or(DEFAULT_SHED_HYSTERESIS_W),
            days,
            window,
            catchup: raw.catchup.map(CatchupPolicy::from_raw).unwrap_or_default(),
            control: convert_control(raw.control),
        }
    }

    /// Headroom required to start: `rated × surge × (1 + start_margin/100)`, rounded
    pub fn needed_watts(&self) -> i64 {
        (self.rated_watts as f64 * self.surge_multiplier * (1.0 + self.start_margin_pct / 100.0))
            .round() as i64
    }

    /// Rated draw plus the keep margin
    pub fn keep_watts(&self) -> i64 {
        (self.rated_watts as f64 * (1.0 + self.keep_margin_pct / 100.0)).round() as i64
    }

    pub fn is_monitored(&self) -> bool {
        self.control.is_monitored()
    }
}

fn non_negative_mins(value: Option<i64>) -> u32 {
    value.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

fn convert_control(raw: RawControl) -> LoadControl {
    match raw {
        RawControl::CommandGroup { on, off } => LoadControl::CommandGroup { on, off },
        RawControl::Device {
            turn_on,
            turn_off,
            toggle,
            query,
            on_command,
            off_command,
        } => LoadControl::Device(DeviceControl {
            turn_on,
            turn_off,
            toggle,
            query,
            on_command,
            off_command,
        }),
    }
}
