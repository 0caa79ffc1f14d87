//! Shared types for the headroomd API

use chrono::{DateTime, Local};
use headroom_util::LoadId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a load is switched on and off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadControl {
    /// Fire-and-forget commands; the actual device state is never observed
    CommandGroup { on: Vec<String>, off: Vec<String> },
    /// A monitored device whose on/off state can be queried
    Device(DeviceControl),
}

impl LoadControl {
    /// Whether the scheduler should reconcile against observed device state
    pub fn is_monitored(&self) -> bool {
        matches!(self, LoadControl::Device(_))
    }
}

/// Commands available on a monitored device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceControl {
    pub turn_on: Vec<String>,
    pub turn_off: Vec<String>,
    #[serde(default)]
    pub toggle: Option<Vec<String>>,
    /// Prints the physical state (`on`/`off`, `1`/`0`, `true`/`false`)
    pub query: Vec<String>,
    /// Which device command runs when the scheduler turns the load on
    pub on_command: DeviceCommand,
    /// Which device command runs when the scheduler turns the load off
    pub off_command: DeviceCommand,
}

impl DeviceControl {
    /// The eco-mode pairing: "on" switches the device off and vice versa.
    /// The load is then logically running while the device is physically off.
    pub fn is_inverted(&self) -> bool {
        self.on_command == DeviceCommand::TurnOff && self.off_command == DeviceCommand::TurnOn
    }

    pub fn argv(&self, command: DeviceCommand) -> Option<&[String]> {
        match command {
            DeviceCommand::TurnOn => Some(&self.turn_on),
            DeviceCommand::TurnOff => Some(&self.turn_off),
            DeviceCommand::Toggle => self.toggle.as_deref(),
        }
    }

    /// Map a physical device state to the scheduler's logical running flag
    pub fn logical_state(&self, physical_on: bool) -> bool {
        if self.is_inverted() { !physical_on } else { physical_on }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCommand {
    TurnOn,
    TurnOff,
    Toggle,
}

/// Where a power reading comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSource {
    /// Read a file (sysfs node, exporter output); contents go through watt parsing
    File(PathBuf),
    /// Run a command and parse its stdout
    Command(Vec<String>),
    /// Fixed value in watts
    Value(f64),
}

/// How headroom is derived from the readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadroomMode {
    /// PV - consumption - battery charging
    #[default]
    Balance,
    /// Negated grid import (export is surplus)
    Grid,
}

/// Last telemetry sample as seen by the headroom source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    pub mode: HeadroomMode,
    pub pv_w: Option<f64>,
    pub consumption_w: Option<f64>,
    pub battery_w: Option<f64>,
    pub grid_w: Option<f64>,
    pub headroom_w: Option<i64>,
    pub taken_at: DateTime<Local>,
    /// Values came from the override table rather than sensors
    #[serde(default)]
    pub overridden: bool,
}

/// Running state of a load as shown in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Running,
    Off,
}

impl LoadStatus {
    pub fn from_running(running: bool) -> Self {
        if running { LoadStatus::Running } else { LoadStatus::Off }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadStatus::Running => "RUN",
            LoadStatus::Off => "OFF",
        }
    }
}

/// Why a load was left alone this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another load already started this tick
    Cap,
    /// Concurrency ceiling reached
    Concurrency,
    /// No quota minutes left in this window
    Quota,
    /// Still cooling down after the last stop
    Cooldown,
    /// Not enough surplus to cover the start threshold
    Headroom,
    /// Today is not an allowed day
    OutsideDays,
    /// Outside the allowed time-of-day window
    OutsideHours,
    /// The headroom source had no reading
    NoReading,
    /// The on/off command failed; retried next tick
    ActuationFailed,
}

impl SkipReason {
    /// Reasons that make a load ineligible regardless of power
    pub fn is_policy(&self) -> bool {
        matches!(self, SkipReason::OutsideDays | SkipReason::OutsideHours | SkipReason::Quota)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Cap => "cap",
            SkipReason::Concurrency => "conc",
            SkipReason::Quota => "quota",
            SkipReason::Cooldown => "cooldown",
            SkipReason::Headroom => "headroom",
            SkipReason::OutsideDays => "window (DOW)",
            SkipReason::OutsideHours => "window (time)",
            SkipReason::NoReading => "no reading",
            SkipReason::ActuationFailed => "actuation failed",
        };
        f.write_str(s)
    }
}

/// What the scheduler did with a load this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum TickAction {
    Start,
    Keep,
    Stop,
    Skip(SkipReason),
}

impl fmt::Display for TickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickAction::Start => f.write_str("START"),
            TickAction::Keep => f.write_str("KEEP"),
            TickAction::Stop => f.write_str("STOP"),
            TickAction::Skip(reason) => write!(f, "SKIP ({})", reason),
        }
    }
}

/// Catch-up column of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CatchupStatus {
    /// Catch-up disabled or no target configured
    Off,
    /// Served minutes already cover the target
    Met,
    /// Running under catch-up, minutes still owed
    Active { remaining_mins: u32 },
    /// Minutes owed, not currently running under catch-up
    Needed { remaining_mins: u32 },
}

impl fmt::Display for CatchupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatchupStatus::Off => f.write_str("Off"),
            CatchupStatus::Met => f.write_str("Met"),
            CatchupStatus::Active { remaining_mins } => write!(f, "ACT {}m", remaining_mins),
            CatchupStatus::Needed { remaining_mins } => write!(f, "Need {}m", remaining_mins),
        }
    }
}

/// Why a load was started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StartReason {
    /// Surplus covers the start threshold
    Surplus { headroom_w: i64, needed_w: i64 },
    /// Catch-up minutes are owed inside the catch-up window
    Catchup { deficit_mins: u32 },
}

impl fmt::Display for StartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartReason::Surplus { headroom_w, needed_w } => {
                write!(f, "Start ok (headroom {}W >= {}W)", headroom_w, needed_w)
            }
            StartReason::Catchup { deficit_mins } => {
                write!(f, "Catch-up start (need {}m)", deficit_mins)
            }
        }
    }
}

/// Why a load was stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopReason {
    QuotaExhausted,
    HeadroomLow { headroom_w: i64, hysteresis_w: i64 },
    EmergencyShed { deficit_w: i64 },
    Ineligible { reason: SkipReason },
    CatchupSatisfied,
    CatchupWindowClosed,
    NoHeadroomReading,
    ServiceShutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::QuotaExhausted => f.write_str("Quota exhausted"),
            StopReason::HeadroomLow { headroom_w, hysteresis_w } => {
                write!(f, "Headroom low ({}W below -{}W)", headroom_w, hysteresis_w)
            }
            StopReason::EmergencyShed { deficit_w } => {
                write!(f, "Emergency shed ({}W deficit)", deficit_w)
            }
            StopReason::Ineligible { reason } => write!(f, "Not eligible: {}", reason),
            StopReason::CatchupSatisfied => f.write_str("Catch-up target satisfied"),
            StopReason::CatchupWindowClosed => f.write_str("Catch-up window closed"),
            StopReason::NoHeadroomReading => f.write_str("No headroom available"),
            StopReason::ServiceShutdown => f.write_str("Service shutdown"),
        }
    }
}

/// One row of the per-tick scheduler table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub tier: u8,
    pub load_id: LoadId,
    pub label: String,
    pub rated_watts: u32,
    pub status: LoadStatus,
    /// Runtime accrued in the current quota window
    pub runtime_mins: u32,
    pub remaining_mins: u32,
    /// Headroom required to start
    pub needed_watts: i64,
    pub catchup: CatchupStatus,
    pub action: TickAction,
}

/// Everything the scheduler decided in one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub at: DateTime<Local>,
    /// Headroom as read at the start of the tick
    pub headroom_w: Option<i64>,
    /// Observed value adjusted by the ratings switched this tick; report only
    pub final_headroom_w: Option<i64>,
    pub running: usize,
    pub max_concurrent: usize,
    pub rows: Vec<ReportRow>,
}

impl TickReport {
    pub fn row(&self, load_id: &LoadId) -> Option<&ReportRow> {
        self.rows.iter().find(|r| &r.load_id == load_id)
    }

    pub fn started(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|r| r.action == TickAction::Start)
    }

    pub fn stopped(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|r| r.action == TickAction::Stop)
    }
}

/// Per-load state for status displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadView {
    pub load_id: LoadId,
    pub label: String,
    pub tier: u8,
    pub rated_watts: u32,
    pub needed_watts: i64,
    /// Rated draw plus the keep margin
    pub keep_watts: i64,
    pub monitored: bool,
    pub status: LoadStatus,
    pub quota_window_mins: u32,
    pub quota_anchor: DateTime<Local>,
    pub next_rollover: DateTime<Local>,
    pub target_mins: u32,
    pub served_mins: u32,
    pub remaining_mins: u32,
    /// `round(served / target * 100)` clamped to 0..=100
    pub progress_pct: u8,
    pub window_runtime_mins: u32,
    pub today_runtime_mins: u32,
    pub started_at: Option<DateTime<Local>>,
    pub cooldown_until: Option<DateTime<Local>>,
    pub catchup: CatchupStatus,
    pub catchup_run_mins: u32,
    pub last_reason: Option<String>,
}

/// Full daemon state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStateSnapshot {
    pub api_version: u32,
    pub max_concurrent: usize,
    pub tick_period_secs: u64,
    pub power: Option<PowerReading>,
    #[serde(default)]
    pub loads: Vec<LoadView>,
    pub last_report: Option<TickReport>,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Root or the daemon's own user: may reload configuration
    Admin,
    /// Read-only observer
    Observer,
}

impl ClientRole {
    pub fn can_reload_config(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub telemetry_ok: bool,
    pub actuator_ok: bool,
}
