//! Raw configuration schema (as parsed from TOML)

use headroom_api::{DeviceCommand, SensorSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Where power readings come from
    #[serde(default)]
    pub telemetry: RawTelemetry,

    /// Managed loads
    #[serde(default)]
    pub loads: Vec<RawLoad>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path override
    pub socket_path: Option<PathBuf>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Scheduler cadence in minutes (default 1)
    pub tick_period_mins: Option<f64>,

    /// Concurrency ceiling, clamped to 1..=32 (default 2)
    pub max_concurrent_loads: Option<i64>,

    /// Command running loads off when the service exits
    #[serde(default)]
    pub shed_on_exit: bool,
}

/// Telemetry sources
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTelemetry {
    /// "balance" (default) or "grid"
    pub mode: Option<String>,

    /// Refresh cadence in seconds (default 30)
    pub refresh_secs: Option<u64>,

    pub pv: Option<SensorSource>,
    pub consumption: Option<SensorSource>,
    pub battery: Option<SensorSource>,
    pub grid: Option<SensorSource>,

    /// Fixed values that replace sensor readings
    #[serde(rename = "override")]
    pub override_values: Option<RawOverride>,
}

/// Override table for bench testing
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawOverride {
    pub pv_w: Option<f64>,
    pub consumption_w: Option<f64>,
    pub battery_w: Option<f64>,
    pub grid_w: Option<f64>,

    /// Force grid mode regardless of `telemetry.mode`
    #[serde(default)]
    pub use_grid: bool,
}

/// Raw load definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLoad {
    /// Unique stable ID
    pub id: String,

    /// Display label (defaults to the id)
    pub label: Option<String>,

    /// Priority tier, 1 = highest (default 2)
    pub tier: Option<i64>,

    /// Nameplate draw in watts
    #[serde(default)]
    pub rated_watts: i64,

    /// "12h", "24h", "48h", "72h" (or "1d", "2d", "3d")
    pub quota_window: Option<String>,

    /// Runtime target per quota window
    pub max_runtime_per_quota_mins: Option<i64>,

    /// Protects a freshly started load from headroom stops
    pub min_runtime_mins: Option<i64>,

    /// Minimum off time before a normal restart
    pub cooldown_mins: Option<i64>,

    pub start_margin_pct: Option<f64>,
    pub keep_margin_pct: Option<f64>,
    pub surge_multiplier: Option<f64>,
    pub shed_hysteresis_w: Option<i64>,

    /// Allowed days of the week (default all)
    pub days: Option<RawDays>,

    /// Allowed time of day, inclusive (default 00:00 - 23:59)
    pub window_start: Option<String>,
    pub window_end: Option<String>,

    /// Minimum-runtime guarantee
    pub catchup: Option<RawCatchup>,

    /// How the load is switched
    pub control: RawControl,
}

/// Days specification: either a preset or a list of days
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDays {
    Preset(String),
    List(Vec<String>),
}

/// Catch-up settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCatchup {
    #[serde(default)]
    pub enabled: bool,

    /// Minutes owed per quota window
    #[serde(default)]
    pub runtime_mins: i64,

    /// Half-open window (default 00:00 - 06:00)
    pub window_start: Option<String>,
    pub window_end: Option<String>,
}

/// Raw control specification
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawControl {
    CommandGroup {
        on: Vec<String>,
        off: Vec<String>,
    },
    Device {
        turn_on: Vec<String>,
        turn_off: Vec<String>,
        #[serde(default)]
        toggle: Option<Vec<String>>,
        query: Vec<String>,
        #[serde(default = "default_on_command")]
        on_command: DeviceCommand,
        #[serde(default = "default_off_command")]
        off_command: DeviceCommand,
    },
}

fn default_on_command() -> DeviceCommand {
    DeviceCommand::TurnOn
}

fn default_off_command() -> DeviceCommand {
    DeviceCommand::TurnOff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_group_load() {
        let toml_str = r#"
            config_version = 1

            [telemetry]
            pv = { file = "/run/solar/pv_w" }
            consumption = { command = ["solar-read", "load"] }

            [[loads]]
            id = "pool-pump"
            tier = 1
            rated_watts = 1000
            max_runtime_per_quota_mins = 60

            [loads.control]
            type = "command_group"
            on = ["relay", "on", "1"]
            off = ["relay", "off", "1"]
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.loads.len(), 1);
        assert_eq!(config.loads[0].tier, Some(1));
        assert!(matches!(config.telemetry.pv, Some(SensorSource::File(_))));
        assert!(matches!(config.loads[0].control, RawControl::CommandGroup { .. }));
    }

    #[test]
    fn parse_device_load_with_catchup() {
        let toml_str = r#"
            config_version = 1

            [[loads]]
            id = "heater"
            rated_watts = 2000
            days = ["mon", "wed", "fri"]

            [loads.catchup]
            enabled = true
            runtime_mins = 30

            [loads.control]
            type = "device"
            turn_on = ["plug", "on"]
            turn_off = ["plug", "off"]
            query = ["plug", "state"]
            on_command = "turn_off"
            off_command = "turn_on"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        let load = &config.loads[0];
        assert!(matches!(load.days, Some(RawDays::List(ref d)) if d.len() == 3));
        assert_eq!(load.catchup.as_ref().unwrap().runtime_mins, 30);
        match &load.control {
            RawControl::Device { on_command, toggle, .. } => {
                assert_eq!(*on_command, DeviceCommand::TurnOff);
                assert!(toggle.is_none());
            }
            other => panic!("unexpected control {:?}", other),
        }
    }

    #[test]
    fn parse_override_table() {
        let toml_str = r#"
            config_version = 1

            [telemetry]
            mode = "grid"
            grid = { value = -1200 }

            [telemetry.override]
            pv_w = 2000
            use_grid = true
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        let o = config.telemetry.override_values.unwrap();
        assert_eq!(o.pv_w, Some(2000.0));
        assert!(o.use_grid);
        assert_eq!(config.telemetry.grid, Some(SensorSource::Value(-1200.0)));
    }
}
