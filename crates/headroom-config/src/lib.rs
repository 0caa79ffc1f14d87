//! Configuration parsing and validation for headroomd
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Telemetry sensors and an override table
//! - Load definitions with quotas, windows, catch-up and control commands
//! - Validation graded by severity: rejected documents, excluded loads, warnings

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
///
/// Document-level problems reject the config. Load-level problems leave the
/// offending load out of the returned policy; warnings are logged and kept
/// in [`Policy::issues`].
pub fn parse_config(content: &str) -> ConfigResult<Policy> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let issues = validate_config(&raw);
    if issues.iter().any(|e| e.severity() == Severity::Rejected) {
        return Err(ConfigError::ValidationFailed { errors: issues });
    }

    for issue in &issues {
        match issue.severity() {
            Severity::LoadExcluded => warn!(issue = %issue, "Load excluded from policy"),
            _ => warn!(issue = %issue, "Config warning, using default"),
        }
    }

    Ok(Policy::from_raw(raw, issues))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use headroom_api::{HeadroomMode, LoadControl};
    use headroom_util::{DaysOfWeek, LoadId, WallClock};
    use std::io::Write;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1

            [telemetry]
            pv = { value = 1500 }
            consumption = { value = 0 }

            [[loads]]
            id = "pool-pump"
            rated_watts = 1000
            max_runtime_per_quota_mins = 60
            control = { type = "command_group", on = ["relay", "on"], off = ["relay", "off"] }
        "#;

        let policy = parse_config(config).unwrap();
        assert_eq!(policy.loads.len(), 1);

        let load = &policy.loads[0];
        assert_eq!(load.id.as_str(), "pool-pump");
        assert_eq!(load.label, "pool-pump");
        assert_eq!(load.tier, DEFAULT_TIER);
        assert_eq!(load.target_mins, 60);
        assert_eq!(load.quota_window, QuotaWindow::Hours24);
        assert_eq!(load.days, DaysOfWeek::ALL_DAYS);
        assert!(!load.catchup.enabled);
        assert!(matches!(load.control, LoadControl::CommandGroup { .. }));

        assert_eq!(policy.service.max_concurrent_loads, DEFAULT_MAX_CONCURRENT);
        assert_eq!(policy.telemetry.mode, HeadroomMode::Balance);
        assert!(policy.issues.is_empty());
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn excluded_load_does_not_reject_the_rest() {
        let config = r#"
            config_version = 1

            [telemetry]
            consumption = { value = 300 }

            [[loads]]
            id = "good"
            rated_watts = 500
            max_runtime_per_quota_mins = 30
            control = { type = "command_group", on = ["a"], off = ["b"] }

            [[loads]]
            id = "broken"
            rated_watts = -5
            max_runtime_per_quota_mins = 30
            control = { type = "command_group", on = ["a"], off = ["b"] }
        "#;

        let policy = parse_config(config).unwrap();
        assert_eq!(policy.loads.len(), 1);
        assert!(policy.get_load(&LoadId::new("good")).is_some());
        assert_eq!(policy.excluded_loads(), vec!["broken"]);
    }

    #[test]
    fn malformed_window_is_permissive() {
        let config = r#"
            config_version = 1

            [telemetry]
            consumption = { value = 300 }

            [[loads]]
            id = "heater"
            rated_watts = 2000
            max_runtime_per_quota_mins = 120
            window_start = "8am"
            window_end = "17:00"
            days = "weekdays"
            control = { type = "command_group", on = ["a"], off = ["b"] }

            [loads.catchup]
            enabled = true
            runtime_mins = 30
            window_start = "01:00"
        "#;

        let policy = parse_config(config).unwrap();
        let load = &policy.loads[0];
        assert_eq!(load.window, headroom_util::DailyWindow::ALWAYS);
        assert_eq!(load.days, DaysOfWeek::WEEKDAYS);
        assert_eq!(load.catchup.window.start, WallClock::new(1, 0).unwrap());
        assert_eq!(load.catchup.window.end, WallClock::new(6, 0).unwrap());
        assert_eq!(policy.warnings().count(), 1);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            config_version = 1
            [service]
            tick_period_mins = 2
            max_concurrent_loads = 3
            [telemetry]
            mode = "grid"
            grid = {{ file = "/run/solar/grid_w" }}
            "#
        )
        .unwrap();

        let policy = load_config(file.path()).unwrap();
        assert_eq!(policy.service.tick_period.as_secs(), 120);
        assert_eq!(policy.service.max_concurrent_loads, 3);
        assert_eq!(policy.telemetry.mode, HeadroomMode::Grid);
        assert!(policy.loads.is_empty());
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = load_config("/nonexistent/headroomd/config.toml");
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
    #[test]
    fn example_config_is_clean() {
        let policy = parse_config(include_str!("../../../config.example.toml")).unwrap();
        assert!(policy.issues.is_empty(), "{:?}", policy.issues);
        assert_eq!(policy.loads.len(), 3);

        let pump = policy.get_load(&LoadId::new("pool-pump")).unwrap();
        assert!(pump.catchup.enabled);
        assert_eq!(pump.catchup.runtime_mins, 120);
        assert_eq!(pump.window.start, WallClock { hour: 8, minute: 0 });

        let heater = policy.get_load(&LoadId::new("water-heater")).unwrap();
        assert!(matches!(heater.control, LoadControl::Device(_)));
        assert_eq!(heater.days, DaysOfWeek::WEEKDAYS);
        assert_eq!(heater.needed_watts(), 2640);
    }
}
