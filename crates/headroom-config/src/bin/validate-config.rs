//! Config validation CLI tool
//!
//! Validates a headroomd configuration file and reports any issues.

use headroom_api::{DeviceCommand, LoadControl};
use headroom_config::{ConfigError, Severity, CURRENT_CONFIG_VERSION};
use headroom_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a headroomd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match headroom_config::load_config(&config_path) {
        Ok(policy) => {
            let excluded = policy.excluded_loads();
            if excluded.is_empty() {
                println!("✓ Configuration is valid");
            } else {
                println!("✗ Configuration loaded with {} excluded load(s)", excluded.len());
            }
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Tick period: {}s", policy.service.tick_period.as_secs());
            println!("  Max concurrent loads: {}", policy.service.max_concurrent_loads);
            println!("  Telemetry mode: {:?}", policy.telemetry.mode);
            println!("  Loads: {}", policy.loads.len());

            if !policy.loads.is_empty() {
                println!();
                println!("Loads:");
                for load in &policy.loads {
                    let control = match &load.control {
                        LoadControl::CommandGroup { on, .. } => {
                            format!("command ({})", on.join(" "))
                        }
                        LoadControl::Device(device) => {
                            let mode = if device.is_inverted() { ", inverted" } else { "" };
                            let on = match device.on_command {
                                DeviceCommand::TurnOn => "turn_on",
                                DeviceCommand::TurnOff => "turn_off",
                                DeviceCommand::Toggle => "toggle",
                            };
                            format!("device (on via {}{})", on, mode)
                        }
                    };
                    println!(
                        "  - {} [tier {}, {}W, {}m per {}h, {}]: {}",
                        load.id,
                        load.tier,
                        load.rated_watts,
                        load.target_mins,
                        load.quota_window.minutes() / 60,
                        control,
                        load.label
                    );
                }
            }

            if !policy.issues.is_empty() {
                println!();
                println!("Issues ({}):", policy.issues.len());
                for issue in &policy.issues {
                    let mark = match issue.severity() {
                        Severity::Warning => "⚠",
                        _ => "✗",
                    };
                    println!("  {} {}", mark, issue);
                }
            }

            if excluded.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        let mark = match err.severity() {
                            Severity::Warning => "⚠",
                            _ => "✗",
                        };
                        eprintln!("  {} {}", mark, err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
