//! Configuration validation

use crate::schema::{RawConfig, RawControl, RawDays, RawLoad};
use headroom_api::DeviceCommand;
use headroom_util::{DaysOfWeek, WallClock};
use std::collections::HashSet;
use thiserror::Error;

/// How much of the configuration an issue invalidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// A permissive default was applied
    Warning,
    /// The offending load is left out; the rest of the config is used
    LoadExcluded,
    /// The whole document is rejected
    Rejected,
}

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Duplicate load ID: {0}")]
    DuplicateLoadId(String),

    #[error("Telemetry mode '{mode}' requires a '{sensor}' sensor or override")]
    MissingSensor { mode: String, sensor: &'static str },

    #[error("Load '{load_id}': {message}")]
    LoadError { load_id: String, message: String },

    #[error("Load '{load_id}': invalid {field} '{value}': {message}")]
    InvalidTimeFormat {
        load_id: String,
        field: &'static str,
        value: String,
        message: String,
    },

    #[error("Load '{load_id}': invalid day specification: {message}")]
    InvalidDaySpec { load_id: String, message: String },

    #[error("Load '{load_id}': {message}")]
    LoadWarning { load_id: String, message: String },

    #[error("{0}")]
    GlobalWarning(String),
}

impl ValidationError {
    pub fn severity(&self) -> Severity {
        match self {
            ValidationError::DuplicateLoadId(_) | ValidationError::MissingSensor { .. } => {
                Severity::Rejected
            }
            ValidationError::LoadError { .. } => Severity::LoadExcluded,
            ValidationError::InvalidTimeFormat { .. }
            | ValidationError::InvalidDaySpec { .. }
            | ValidationError::LoadWarning { .. }
            | ValidationError::GlobalWarning(_) => Severity::Warning,
        }
    }

    /// The load an issue refers to, if any
    pub fn load_id(&self) -> Option<&str> {
        match self {
            ValidationError::LoadError { load_id, .. }
            | ValidationError::InvalidTimeFormat { load_id, .. }
            | ValidationError::InvalidDaySpec { load_id, .. }
            | ValidationError::LoadWarning { load_id, .. } => Some(load_id),
            _ => None,
        }
    }
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen_ids = HashSet::new();
    for load in &config.loads {
        if !load.id.is_empty() && !seen_ids.insert(&load.id) {
            errors.push(ValidationError::DuplicateLoadId(load.id.clone()));
        }
    }

    errors.extend(validate_service(config));
    errors.extend(validate_telemetry(config));

    for load in &config.loads {
        errors.extend(validate_load(load));
    }

    errors
}

fn validate_service(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let service = &config.service;

    if let Some(n) = service.max_concurrent_loads
        && !(1..=32).contains(&n)
    {
        errors.push(ValidationError::GlobalWarning(format!(
            "max_concurrent_loads {} out of range, clamped to {}",
            n,
            n.clamp(1, 32)
        )));
    }

    if let Some(p) = service.tick_period_mins
        && (!p.is_finite() || p <= 0.0)
    {
        errors.push(ValidationError::GlobalWarning(format!(
            "tick_period_mins {} must be positive, using 1",
            p
        )));
    }

    errors
}

fn validate_telemetry(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let telemetry = &config.telemetry;
    let overrides = telemetry.override_values.clone().unwrap_or_default();

    let mode = telemetry.mode.as_deref().unwrap_or("balance").to_lowercase();
    let grid_mode = match mode.as_str() {
        "balance" => false,
        "grid" => true,
        other => {
            errors.push(ValidationError::GlobalWarning(format!(
                "unknown telemetry mode '{}', using balance",
                other
            )));
            false
        }
    };

    if grid_mode || overrides.use_grid {
        if telemetry.grid.is_none() && overrides.grid_w.is_none() {
            errors.push(ValidationError::MissingSensor { mode: "grid".into(), sensor: "grid" });
        }
    } else if telemetry.consumption.is_none() && overrides.consumption_w.is_none() {
        errors.push(ValidationError::MissingSensor {
            mode: "balance".into(),
            sensor: "consumption",
        });
    }

    if telemetry.refresh_secs == Some(0) {
        errors.push(ValidationError::GlobalWarning(
            "telemetry refresh_secs must be positive, using 30".into(),
        ));
    }

    errors
}

fn validate_load(load: &RawLoad) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let id = load.id.clone();
    let load_error = |message: &str| ValidationError::LoadError {
        load_id: id.clone(),
        message: message.into(),
    };
    let load_warning = |message: String| ValidationError::LoadWarning {
        load_id: id.clone(),
        message,
    };

    if load.id.trim().is_empty() {
        errors.push(load_error("id cannot be empty"));
    }

    if let Some(tier) = load.tier
        && !(1..=4).contains(&tier)
    {
        errors.push(load_error(&format!("tier {} must be between 1 and 4", tier)));
    }

    if load.rated_watts <= 0 {
        errors.push(load_error("rated_watts must be positive"));
    }

    errors.extend(validate_control(&load.control, &id));

    if let Some(window) = &load.quota_window
        && parse_quota_window(window).is_none()
    {
        errors.push(load_warning(format!("unknown quota_window '{}', using 24h", window)));
    }

    if load.max_runtime_per_quota_mins.unwrap_or(0) <= 0 {
        errors.push(load_warning(
            "max_runtime_per_quota_mins is not positive; the load never starts on surplus".into(),
        ));
    }

    if load.min_runtime_mins.is_some_and(|m| m < 0) {
        errors.push(load_warning("min_runtime_mins is negative, using 0".into()));
    }
    if load.cooldown_mins.is_some_and(|m| m < 0) {
        errors.push(load_warning("cooldown_mins is negative, using 0".into()));
    }

    if load.surge_multiplier.is_some_and(|s| !(s >= 1.0)) {
        errors.push(load_warning("surge_multiplier below 1.0, using 1.2".into()));
    }
    if load.start_margin_pct.is_some_and(|m| !(m >= 0.0)) {
        errors.push(load_warning("start_margin_pct is negative, using 20".into()));
    }
    if load.keep_margin_pct.is_some_and(|m| !(m >= 0.0)) {
        errors.push(load_warning("keep_margin_pct is negative, using 5".into()));
    }
    if load.shed_hysteresis_w.is_some_and(|h| h < 0) {
        errors.push(load_warning("shed_hysteresis_w is negative, using 100".into()));
    }

    if let Some(days) = &load.days {
        match parse_days(days) {
            Ok(mask) if mask.is_empty() => errors.push(load_warning(
                "no allowed days, treating every day as allowed".into(),
            )),
            Ok(_) => {}
            Err(message) => errors.push(ValidationError::InvalidDaySpec {
                load_id: id.clone(),
                message,
            }),
        }
    }

    for (field, value) in [
        ("window_start", &load.window_start),
        ("window_end", &load.window_end),
    ] {
        if let Some(value) = value
            && let Err(message) = parse_time(value)
        {
            errors.push(ValidationError::InvalidTimeFormat {
                load_id: id.clone(),
                field,
                value: value.clone(),
                message,
            });
        }
    }

    if let Some(catchup) = &load.catchup {
        if catchup.enabled && catchup.runtime_mins <= 0 {
            errors.push(load_warning(
                "catch-up enabled without a positive runtime_mins; catch-up is off".into(),
            ));
        }
        for (field, value) in [
            ("catchup.window_start", &catchup.window_start),
            ("catchup.window_end", &catchup.window_end),
        ] {
            if let Some(value) = value
                && let Err(message) = parse_time(value)
            {
                errors.push(ValidationError::InvalidTimeFormat {
                    load_id: id.clone(),
                    field,
                    value: value.clone(),
                    message,
                });
            }
        }
    }

    errors
}

fn validate_control(control: &RawControl, load_id: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match control {
        RawControl::CommandGroup { on, off } => {
            errors.extend(empty_command(on, "on", load_id));
            errors.extend(empty_command(off, "off", load_id));
        }
        RawControl::Device {
            turn_on,
            turn_off,
            toggle,
            query,
            on_command,
            off_command,
        } => {
            errors.extend(empty_command(turn_on, "turn_on", load_id));
            errors.extend(empty_command(turn_off, "turn_off", load_id));
            errors.extend(empty_command(query, "query", load_id));
            let toggle_selected =
                *on_command == DeviceCommand::Toggle || *off_command == DeviceCommand::Toggle;
            match toggle {
                Some(argv) if toggle_selected => {
                    errors.extend(empty_command(argv, "toggle", load_id));
                }
                None if toggle_selected => errors.push(ValidationError::LoadError {
                    load_id: load_id.to_string(),
                    message: "toggle selected as on/off command but no toggle command given"
                        .into(),
                }),
                _ => {}
            }
        }
    }

    errors
}

fn empty_command(argv: &[String], name: &str, load_id: &str) -> Option<ValidationError> {
    if argv.first().is_some_and(|program| !program.trim().is_empty()) {
        return None;
    }
    Some(ValidationError::LoadError {
        load_id: load_id.to_string(),
        message: format!("{} command cannot be empty", name),
    })
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<WallClock, String> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 2 {
        return Err("Expected HH:MM format".into());
    }

    let hour: u8 = parts[0]
        .parse()
        .map_err(|_| "Invalid hour".to_string())?;
    let minute: u8 = parts[1]
        .parse()
        .map_err(|_| "Invalid minute".to_string())?;

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }

    WallClock::new(hour, minute).ok_or_else(|| "Invalid time".to_string())
}

/// Parse days specification
pub fn parse_days(days: &RawDays) -> Result<DaysOfWeek, String> {
    match days {
        RawDays::Preset(preset) => match preset.to_lowercase().as_str() {
            "all" | "every" | "daily" => Ok(DaysOfWeek::ALL_DAYS),
            "weekdays" => Ok(DaysOfWeek::WEEKDAYS),
            "weekends" => Ok(DaysOfWeek::WEEKENDS),
            other => Err(format!("Unknown day preset: {}", other)),
        },
        RawDays::List(list) => {
            let mut mask = 0u8;
            for day in list {
                let bit = match day.to_lowercase().as_str() {
                    "mon" | "monday" => DaysOfWeek::MONDAY,
                    "tue" | "tuesday" => DaysOfWeek::TUESDAY,
                    "wed" | "wednesday" => DaysOfWeek::WEDNESDAY,
                    "thu" | "thursday" => DaysOfWeek::THURSDAY,
                    "fri" | "friday" => DaysOfWeek::FRIDAY,
                    "sat" | "saturday" => DaysOfWeek::SATURDAY,
                    "sun" | "sunday" => DaysOfWeek::SUNDAY,
                    other => return Err(format!("Unknown day: {}", other)),
                };
                mask |= bit;
            }
            Ok(DaysOfWeek::new(mask))
        }
    }
}

/// Parse a quota window label into minutes
pub fn parse_quota_window(s: &str) -> Option<u32> {
    match s.trim().to_lowercase().as_str() {
        "12h" => Some(12 * 60),
        "24h" | "1d" => Some(24 * 60),
        "48h" | "2d" => Some(48 * 60),
        "72h" | "3d" => Some(72 * 60),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(toml_str: &str) -> RawConfig {
        toml::from_str(toml_str).unwrap()
    }

    const TELEMETRY: &str = r#"
        config_version = 1
        [telemetry]
        consumption = { value = 400 }
    "#;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("14:30").unwrap(), WallClock::new(14, 30).unwrap());
        assert_eq!(parse_time("00:00").unwrap(), WallClock::MIDNIGHT);
        assert_eq!(parse_time("23:59").unwrap(), WallClock::new(23, 59).unwrap());

        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("invalid").is_err());
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days(&RawDays::Preset("weekdays".into())).unwrap(), DaysOfWeek::WEEKDAYS);
        assert_eq!(parse_days(&RawDays::Preset("weekends".into())).unwrap(), DaysOfWeek::WEEKENDS);
        assert_eq!(parse_days(&RawDays::Preset("all".into())).unwrap(), DaysOfWeek::ALL_DAYS);

        assert_eq!(
            parse_days(&RawDays::List(vec!["mon".into(), "wed".into(), "fri".into()]))
                .unwrap()
                .mask(),
            0b10101
        );
        assert!(parse_days(&RawDays::List(vec!["funday".into()])).is_err());
    }

    #[test]
    fn test_quota_window_aliases() {
        assert_eq!(parse_quota_window("12h"), Some(720));
        assert_eq!(parse_quota_window("1d"), Some(1440));
        assert_eq!(parse_quota_window("3D"), Some(4320));
        assert_eq!(parse_quota_window("weekly"), None);
    }

    #[test]
    fn test_duplicate_id_detection() {
        let config = raw(&format!(
            r#"{TELEMETRY}
            [[loads]]
            id = "pump"
            rated_watts = 500
            control = {{ type = "command_group", on = ["a"], off = ["b"] }}

            [[loads]]
            id = "pump"
            rated_watts = 700
            control = {{ type = "command_group", on = ["a"], off = ["b"] }}
            "#
        ));

        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateLoadId(_))));
        assert!(errors.iter().any(|e| e.severity() == Severity::Rejected));
    }

    #[test]
    fn test_missing_consumption_sensor_rejects() {
        let config = raw("config_version = 1");
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::MissingSensor { sensor: "consumption", .. }
        )));
    }

    #[test]
    fn test_bad_load_is_excluded_not_rejected() {
        let config = raw(&format!(
            r#"{TELEMETRY}
            [[loads]]
            id = "bad"
            tier = 7
            rated_watts = 0
            control = {{ type = "command_group", on = [], off = ["b"] }}
            "#
        ));

        let errors = validate_config(&config);
        let load_errors: Vec<_> = errors
            .iter()
            .filter(|e| e.severity() == Severity::LoadExcluded)
            .collect();
        assert_eq!(load_errors.len(), 3);
        assert!(load_errors.iter().all(|e| e.load_id() == Some("bad")));
        assert!(!errors.iter().any(|e| e.severity() == Severity::Rejected));
    }

    #[test]
    fn test_toggle_without_argv() {
        let config = raw(&format!(
            r#"{TELEMETRY}
            [[loads]]
            id = "plug"
            rated_watts = 100
            max_runtime_per_quota_mins = 30
            [loads.control]
            type = "device"
            turn_on = ["p", "on"]
            turn_off = ["p", "off"]
            query = ["p", "state"]
            on_command = "toggle"
            "#
        ));

        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.severity() == Severity::LoadExcluded
            && e.to_string().contains("toggle")));
    }

    #[test]
    fn test_warnings_for_soft_problems() {
        let config = raw(&format!(
            r#"{TELEMETRY}
            [service]
            max_concurrent_loads = 99

            [[loads]]
            id = "soft"
            rated_watts = 100
            quota_window = "weekly"
            surge_multiplier = 0.5
            window_start = "25:00"
            days = []
            control = {{ type = "command_group", on = ["a"], off = ["b"] }}
            "#
        ));

        let errors = validate_config(&config);
        assert!(!errors.is_empty());
        assert!(errors.iter().all(|e| e.severity() == Severity::Warning));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidTimeFormat { .. })));
        assert!(errors.iter().any(|e| e.to_string().contains("no allowed days")));
        assert!(errors.iter().any(|e| e.to_string().contains("clamped to 32")));
    }
}
