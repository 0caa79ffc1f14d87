//! Host traits

use async_trait::async_trait;
use headroom_api::PowerReading;
use headroom_util::LoadId;
use thiserror::Error;

/// Errors from host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Command not configured for load {0}")]
    NotConfigured(LoadId),

    #[error("Unknown load: {0}")]
    UnknownLoad(LoadId),

    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Last-known surplus power. Readers never block on a sensor.
pub trait HeadroomSource: Send + Sync {
    /// Signed watts: positive is surplus, negative is deficit. `None` when no
    /// reading is available.
    fn current_headroom_watts(&self) -> Option<i64>;

    /// The full sample behind the headroom figure, if the source keeps one
    fn latest_reading(&self) -> Option<PowerReading> {
        None
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Switches loads on and off and reports device state
#[async_trait]
pub trait LoadActuator: Send + Sync {
    /// Command a load on or off. `reason` is for logs only.
    async fn set_power(&self, load: &LoadId, on: bool, reason: &str) -> HostResult<()>;

    /// Logical running state as observed on the device, or `None` when the
    /// load is not monitored or the query failed
    async fn observed_external_on_state(&self, load: &LoadId) -> Option<bool>;

    fn is_healthy(&self) -> bool {
        true
    }
}
