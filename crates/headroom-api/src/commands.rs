//! Command types for the headroomd protocol

use headroom_util::ClientId;
use serde::{Deserialize, Serialize};

use crate::{ClientRole, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    LoadNotFound,
    NoReportYet,
    PermissionDenied,
    RateLimited,
    ConfigError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Loads, last power reading and last report
    GetState,
    /// Per-load views only
    ListLoads,
    /// The most recent tick report
    GetReport,
    /// Re-read the configuration file (admin only)
    ReloadConfig,
    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,
    UnsubscribeEvents,
    GetHealth,
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(crate::DaemonStateSnapshot),
    Loads { loads: Vec<crate::LoadView> },
    Report(crate::TickReport),
    ConfigReloaded { load_count: usize },
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Health(crate::HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(7, Command::GetReport);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("get_report"));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 7);
        assert!(matches!(parsed.command, Command::GetReport));
    }

    #[test]
    fn error_response_serialization() {
        let resp = Response::error(3, ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"));
        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();

        match parsed.result {
            ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::PermissionDenied),
            ResponseResult::Ok(_) => panic!("expected error"),
        }
    }
}
