//! Command-driven load actuator

use async_trait::async_trait;
use headroom_api::{DeviceControl, LoadControl};
use headroom_host_api::{HostError, HostResult, LoadActuator};
use headroom_util::LoadId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::process::{run_command, DEFAULT_COMMAND_TIMEOUT};

/// Switches loads by running their configured on/off commands
pub struct CommandActuator {
    controls: RwLock<HashMap<LoadId, LoadControl>>,
    timeout: Duration,
}

impl CommandActuator {
    pub fn new(controls: impl IntoIterator<Item = (LoadId, LoadControl)>) -> Self {
        Self {
            controls: RwLock::new(controls.into_iter().collect()),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the control table after a config reload
    pub async fn reload(&self, controls: impl IntoIterator<Item = (LoadId, LoadControl)>) {
        let mut table = self.controls.write().await;
        *table = controls.into_iter().collect();
        info!(load_count = table.len(), "Actuator controls reloaded");
    }

    async fn control(&self, load: &LoadId) -> HostResult<LoadControl> {
        self.controls
            .read()
            .await
            .get(load)
            .cloned()
            .ok_or_else(|| HostError::UnknownLoad(load.clone()))
    }
}

/// argv that puts the load in the requested logical state
fn power_argv(load: &LoadId, control: &LoadControl, on: bool) -> HostResult<Vec<String>> {
    let argv = match control {
        LoadControl::CommandGroup { on: on_argv, off } => {
            if on { on_argv.clone() } else { off.clone() }
        }
        LoadControl::Device(device) => {
            let command = if on { device.on_command } else { device.off_command };
            device
                .argv(command)
                .map(<[String]>::to_vec)
                .unwrap_or_default()
        }
    };

    if argv.is_empty() {
        return Err(HostError::NotConfigured(load.clone()));
    }
    Ok(argv)
}

/// Parse a device query's output as a physical on/off state
pub fn parse_on_off(output: &str) -> Option<bool> {
    let word = output.split_whitespace().next()?.to_lowercase();
    match word.as_str() {
        "on" | "1" | "true" | "yes" => Some(true),
        "off" | "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[async_trait]
impl LoadActuator for CommandActuator {
    async fn set_power(&self, load: &LoadId, on: bool, reason: &str) -> HostResult<()> {
        let control = self.control(load).await?;
        let argv = power_argv(load, &control, on)?;

        debug!(load_id = %load, on, command = ?argv, "Running power command");
        run_command(&argv, self.timeout).await?;
        info!(load_id = %load, on, reason = %reason, "Power command sent");
        Ok(())
    }

    async fn observed_external_on_state(&self, load: &LoadId) -> Option<bool> {
        let LoadControl::Device(device) = self.control(load).await.ok()? else {
            return None;
        };
        query_device(load, &device, self.timeout).await
    }
}

async fn query_device(load: &LoadId, device: &DeviceControl, timeout: Duration) -> Option<bool> {
    if device.query.is_empty() {
        return None;
    }

    let output = match run_command(&device.query, timeout).await {
        Ok(output) => output,
        Err(e) => {
            debug!(load_id = %load, error = %e, "Device query failed");
            return None;
        }
    };

    match parse_on_off(&output.stdout) {
        Some(physical) => Some(device.logical_state(physical)),
        None => {
            debug!(load_id = %load, output = %output.stdout.trim(), "Unrecognized device state");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headroom_api::DeviceCommand;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    /// A device whose state lives in a file
    fn file_device(dir: &TempDir, on: DeviceCommand, off: DeviceCommand) -> DeviceControl {
        let state = dir.path().join("state");
        std::fs::write(&state, "off\n").unwrap();
        let path = state.display().to_string();
        DeviceControl {
            turn_on: sh(&format!("echo on > {path}")),
            turn_off: sh(&format!("echo off > {path}")),
            toggle: None,
            query: vec!["cat".into(), path],
            on_command: on,
            off_command: off,
        }
    }

    #[test]
    fn on_off_parsing() {
        assert_eq!(parse_on_off("ON\n"), Some(true));
        assert_eq!(parse_on_off("1"), Some(true));
        assert_eq!(parse_on_off("Yes please"), Some(true));
        assert_eq!(parse_on_off("false"), Some(false));
        assert_eq!(parse_on_off(" off "), Some(false));
        assert_eq!(parse_on_off("unknown"), None);
        assert_eq!(parse_on_off(""), None);
    }

    #[tokio::test]
    async fn command_group_runs_on_and_off() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("relay");
        let path = marker.display().to_string();
        let pump = LoadId::new("pump");
        let actuator = CommandActuator::new([(
            pump.clone(),
            LoadControl::CommandGroup {
                on: sh(&format!("echo on > {path}")),
                off: sh(&format!("echo off > {path}")),
            },
        )]);

        actuator.set_power(&pump, true, "test").await.unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "on");
        actuator.set_power(&pump, false, "test").await.unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "off");

        // Command groups are never observed
        assert_eq!(actuator.observed_external_on_state(&pump).await, None);
    }

    #[tokio::test]
    async fn failing_command_is_an_error() {
        let pump = LoadId::new("pump");
        let actuator = CommandActuator::new([(
            pump.clone(),
            LoadControl::CommandGroup { on: vec!["false".into()], off: vec!["true".into()] },
        )]);

        assert!(matches!(
            actuator.set_power(&pump, true, "test").await,
            Err(HostError::CommandFailed(_))
        ));
        assert!(actuator.set_power(&pump, false, "test").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_load_is_rejected() {
        let actuator = CommandActuator::new([]);
        let result = actuator.set_power(&LoadId::new("ghost"), true, "test").await;
        assert!(matches!(result, Err(HostError::UnknownLoad(_))));
    }

    #[tokio::test]
    async fn device_state_follows_commands() {
        let dir = TempDir::new().unwrap();
        let heater = LoadId::new("heater");
        let device = file_device(&dir, DeviceCommand::TurnOn, DeviceCommand::TurnOff);
        let actuator = CommandActuator::new([(heater.clone(), LoadControl::Device(device))]);

        assert_eq!(actuator.observed_external_on_state(&heater).await, Some(false));
        actuator.set_power(&heater, true, "test").await.unwrap();
        assert_eq!(actuator.observed_external_on_state(&heater).await, Some(true));
    }

    #[tokio::test]
    async fn inverted_device_reports_logical_state() {
        let dir = TempDir::new().unwrap();
        let dehumidifier = LoadId::new("dehumidifier");
        let device = file_device(&dir, DeviceCommand::TurnOff, DeviceCommand::TurnOn);
        let actuator =
            CommandActuator::new([(dehumidifier.clone(), LoadControl::Device(device))]);

        // Physically off means the eco pairing is logically running
        assert_eq!(
            actuator.observed_external_on_state(&dehumidifier).await,
            Some(true)
        );

        actuator.set_power(&dehumidifier, false, "test").await.unwrap();
        assert_eq!(
            actuator.observed_external_on_state(&dehumidifier).await,
            Some(false)
        );
    }

    #[tokio::test]
    async fn missing_toggle_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let fan = LoadId::new("fan");
        let device = file_device(&dir, DeviceCommand::Toggle, DeviceCommand::Toggle);
        let actuator = CommandActuator::new([(fan.clone(), LoadControl::Device(device))]);

        let result = actuator.set_power(&fan, true, "test").await;
        assert!(matches!(result, Err(HostError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn reload_replaces_controls() {
        let pump = LoadId::new("pump");
        let actuator = CommandActuator::new([]);
        assert!(actuator.set_power(&pump, true, "test").await.is_err());

        actuator
            .reload([(
                pump.clone(),
                LoadControl::CommandGroup { on: vec!["true".into()], off: vec!["true".into()] },
            )])
            .await;
        assert!(actuator.set_power(&pump, true, "test").await.is_ok());
    }
}
