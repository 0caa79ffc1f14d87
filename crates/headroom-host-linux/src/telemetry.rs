//! Power telemetry: sensor reading, headroom derivation and the refresh loop
//!
//! The refresh loop is the only writer. The scheduler reads the last
//! snapshot through [`HeadroomSource`] and never waits on a sensor.

use headroom_api::{HeadroomMode, PowerReading, SensorSource};
use headroom_config::{ReadingOverride, TelemetryPolicy};
use headroom_host_api::HeadroomSource;
use headroom_util::parse_to_watts;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::process::{run_command, DEFAULT_COMMAND_TIMEOUT};

/// One set of raw sensor values in watts
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReadings {
    pub pv_w: Option<f64>,
    pub consumption_w: Option<f64>,
    /// Positive while charging
    pub battery_w: Option<f64>,
    /// Positive while importing
    pub grid_w: Option<f64>,
}

impl SensorReadings {
    /// Replace every value the override table names
    pub fn apply_override(mut self, table: &ReadingOverride) -> Self {
        self.pv_w = table.pv_w.or(self.pv_w);
        self.consumption_w = table.consumption_w.or(self.consumption_w);
        self.battery_w = table.battery_w.or(self.battery_w);
        self.grid_w = table.grid_w.or(self.grid_w);
        self
    }
}

/// Surplus watts from a set of readings.
///
/// Grid mode with a grid reading gives the negated import. Otherwise the
/// balance is PV (0 when missing) minus consumption minus battery charging;
/// without a consumption reading there is no headroom.
pub fn compute_headroom(mode: HeadroomMode, readings: &SensorReadings) -> Option<i64> {
    if mode == HeadroomMode::Grid
        && let Some(grid) = readings.grid_w
    {
        return Some((-grid).round() as i64);
    }

    let consumption = readings.consumption_w?;
    let pv = readings.pv_w.unwrap_or(0.0);
    let charging = readings.battery_w.unwrap_or(0.0).max(0.0);
    Some((pv - consumption - charging).round() as i64)
}

/// Read one sensor; `None` when it cannot be read or holds no number
pub async fn read_sensor(source: &SensorSource, timeout: Duration) -> Option<f64> {
    let raw = match source {
        SensorSource::Value(watts) => return watts.is_finite().then_some(*watts),
        SensorSource::File(path) => match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Sensor file unreadable");
                return None;
            }
        },
        SensorSource::Command(argv) => match run_command(argv, timeout).await {
            Ok(output) => output.stdout,
            Err(e) => {
                debug!(command = ?argv, error = %e, "Sensor command failed");
                return None;
            }
        },
    };

    let watts = parse_to_watts(&raw);
    if watts.is_none() {
        debug!(source = ?source, raw = %raw.trim(), "Sensor output holds no number");
    }
    watts
}

async fn read_optional(source: &Option<SensorSource>, timeout: Duration) -> Option<f64> {
    match source {
        Some(source) => read_sensor(source, timeout).await,
        None => None,
    }
}

/// Headroom source backed by configured sensors
pub struct TelemetryHeadroom {
    policy: RwLock<TelemetryPolicy>,
    latest: watch::Sender<Option<PowerReading>>,
    timeout: Duration,
}

impl TelemetryHeadroom {
    pub fn new(policy: TelemetryPolicy) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            policy: RwLock::new(policy),
            latest,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Swap sensor definitions after a config reload
    pub async fn set_policy(&self, policy: TelemetryPolicy) {
        *self.policy.write().await = policy;
    }

    /// Read every sensor once and publish the result
    pub async fn refresh(&self) -> Option<i64> {
        let policy = self.policy.read().await.clone();

        let mut readings = SensorReadings {
            pv_w: read_optional(&policy.pv, self.timeout).await,
            consumption_w: read_optional(&policy.consumption, self.timeout).await,
            battery_w: read_optional(&policy.battery, self.timeout).await,
            grid_w: read_optional(&policy.grid, self.timeout).await,
        };

        let mut mode = policy.mode;
        let overridden = policy.override_values.is_some();
        if let Some(table) = &policy.override_values {
            readings = readings.apply_override(table);
            if table.use_grid {
                mode = HeadroomMode::Grid;
            }
        }

        let headroom_w = compute_headroom(mode, &readings);
        let previous = self.current_headroom_watts();
        match (previous, headroom_w) {
            (Some(_), None) => warn!(?readings, "Headroom unavailable"),
            (None, Some(w)) => info!(headroom_w = w, "Headroom available"),
            _ => debug!(headroom_w = ?headroom_w, ?readings, "Telemetry refreshed"),
        }

        self.latest.send_replace(Some(PowerReading {
            mode,
            pv_w: readings.pv_w,
            consumption_w: readings.consumption_w,
            battery_w: readings.battery_w,
            grid_w: readings.grid_w,
            headroom_w,
            taken_at: headroom_util::now(),
            overridden,
        }));
        headroom_w
    }

    /// Refresh every `refresh` period until shutdown is signalled
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.policy.read().await.refresh;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(refresh_secs = period.as_secs(), "Telemetry loop started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Telemetry loop stopped");
    }
}

impl HeadroomSource for TelemetryHeadroom {
    fn current_headroom_watts(&self) -> Option<i64> {
        self.latest.borrow().as_ref().and_then(|r| r.headroom_w)
    }

    fn latest_reading(&self) -> Option<PowerReading> {
        self.latest.borrow().clone()
    }

    fn is_healthy(&self) -> bool {
        self.current_headroom_watts().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn readings(pv: Option<f64>, load: Option<f64>, battery: Option<f64>, grid: Option<f64>) -> SensorReadings {
        SensorReadings {
            pv_w: pv,
            consumption_w: load,
            battery_w: battery,
            grid_w: grid,
        }
    }

    #[test]
    fn balance_mode() {
        let r = readings(Some(4000.0), Some(1500.0), Some(500.0), None);
        assert_eq!(compute_headroom(HeadroomMode::Balance, &r), Some(2000));

        // Battery discharge does not add headroom
        let r = readings(Some(4000.0), Some(1500.0), Some(-800.0), None);
        assert_eq!(compute_headroom(HeadroomMode::Balance, &r), Some(2500));

        // Missing PV counts as zero
        let r = readings(None, Some(300.0), None, None);
        assert_eq!(compute_headroom(HeadroomMode::Balance, &r), Some(-300));
    }

    #[test]
    fn consumption_is_required_in_balance_mode() {
        let r = readings(Some(4000.0), None, None, Some(-100.0));
        assert_eq!(compute_headroom(HeadroomMode::Balance, &r), None);
    }

    #[test]
    fn grid_mode_negates_import() {
        let r = readings(None, None, None, Some(-1200.4));
        assert_eq!(compute_headroom(HeadroomMode::Grid, &r), Some(1200));

        // Falls back to the balance without a grid reading
        let r = readings(Some(2000.0), Some(500.0), None, None);
        assert_eq!(compute_headroom(HeadroomMode::Grid, &r), Some(1500));
    }

    #[test]
    fn override_replaces_named_values() {
        let table = ReadingOverride {
            consumption_w: Some(100.0),
            ..Default::default()
        };
        let r = readings(Some(900.0), Some(5000.0), None, None).apply_override(&table);
        assert_eq!(r.pv_w, Some(900.0));
        assert_eq!(r.consumption_w, Some(100.0));
    }

    #[tokio::test]
    async fn sensor_sources() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("pv");
        std::fs::write(&file, "PV: 2.4 kW\n").unwrap();

        assert_eq!(
            read_sensor(&SensorSource::File(file), DEFAULT_COMMAND_TIMEOUT).await,
            Some(2400.0)
        );
        assert_eq!(
            read_sensor(
                &SensorSource::Command(vec!["echo".into(), "1,250 W".into()]),
                DEFAULT_COMMAND_TIMEOUT
            )
            .await,
            Some(1250.0)
        );
        assert_eq!(
            read_sensor(&SensorSource::Value(300.0), DEFAULT_COMMAND_TIMEOUT).await,
            Some(300.0)
        );
        assert_eq!(
            read_sensor(
                &SensorSource::File("/nonexistent/headroomd/pv".into()),
                DEFAULT_COMMAND_TIMEOUT
            )
            .await,
            None
        );
        assert_eq!(
            read_sensor(
                &SensorSource::Command(vec!["echo".into(), "offline".into()]),
                DEFAULT_COMMAND_TIMEOUT
            )
            .await,
            None
        );
    }

    #[tokio::test]
    async fn refresh_publishes_reading() {
        let policy = TelemetryPolicy {
            pv: Some(SensorSource::Value(3000.0)),
            consumption: Some(SensorSource::Value(1000.0)),
            ..Default::default()
        };
        let telemetry = TelemetryHeadroom::new(policy);
        assert_eq!(telemetry.current_headroom_watts(), None);
        assert!(!telemetry.is_healthy());

        assert_eq!(telemetry.refresh().await, Some(2000));
        assert_eq!(telemetry.current_headroom_watts(), Some(2000));
        let reading = telemetry.latest_reading().unwrap();
        assert!(!reading.overridden);
        assert_eq!(reading.pv_w, Some(3000.0));
    }

    #[tokio::test]
    async fn override_can_force_grid_mode() {
        let policy = TelemetryPolicy {
            pv: Some(SensorSource::Value(3000.0)),
            consumption: Some(SensorSource::Value(1000.0)),
            override_values: Some(ReadingOverride {
                grid_w: Some(-450.0),
                use_grid: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        let telemetry = TelemetryHeadroom::new(policy);

        assert_eq!(telemetry.refresh().await, Some(450));
        let reading = telemetry.latest_reading().unwrap();
        assert!(reading.overridden);
        assert_eq!(reading.mode, HeadroomMode::Grid);
    }

    #[tokio::test]
    async fn missing_consumption_makes_headroom_unavailable() {
        let telemetry = TelemetryHeadroom::new(TelemetryPolicy {
            pv: Some(SensorSource::Value(3000.0)),
            ..Default::default()
        });
        assert_eq!(telemetry.refresh().await, None);
        assert!(telemetry.latest_reading().is_some());
        assert_eq!(telemetry.current_headroom_watts(), None);
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown() {
        let telemetry = Arc::new(TelemetryHeadroom::new(TelemetryPolicy {
            refresh: Duration::from_millis(10),
            consumption: Some(SensorSource::Value(100.0)),
            ..Default::default()
        }));
        let (tx, rx) = watch::channel(false);

        let task = {
            let telemetry = telemetry.clone();
            tokio::spawn(async move { telemetry.run(rx).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(telemetry.current_headroom_watts(), Some(-100));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
