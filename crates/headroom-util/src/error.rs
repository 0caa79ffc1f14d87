//! Error types for headroomd

use thiserror::Error;

use crate::LoadId;

/// Core error type for headroomd operations
#[derive(Debug, Error)]
pub enum HeadroomError {
    #[error("Load not found: {0}")]
    LoadNotFound(LoadId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Actuation error: {0}")]
    ActuationError(String),

    #[error("Telemetry error: {0}")]
    TelemetryError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HeadroomError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn actuation(msg: impl Into<String>) -> Self {
        Self::ActuationError(msg.into())
    }

    pub fn telemetry(msg: impl Into<String>) -> Self {
        Self::TelemetryError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HeadroomError>;
