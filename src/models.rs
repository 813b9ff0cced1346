//! Shared models and types
//!
//! Types used by more than one module live here to avoid circular
//! dependencies between the registry, the analysis client and the alert
//! buffer.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of safety camera, which also selects the analysis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    Cobot,
    Machine,
    Ppe,
}

impl CameraType {
    pub const ALL: [CameraType; 3] = [CameraType::Cobot, CameraType::Machine, CameraType::Ppe];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraType::Cobot => "cobot",
            CameraType::Machine => "machine",
            CameraType::Ppe => "ppe",
        }
    }
}

impl fmt::Display for CameraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cobot" => Ok(CameraType::Cobot),
            "machine" => Ok(CameraType::Machine),
            "ppe" => Ok(CameraType::Ppe),
            other => Err(Error::InvalidCameraType(other.to_string())),
        }
    }
}

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub cameras: usize,
    pub polling: usize,
}

/// Reachability of one analysis service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub camera_type: CameraType,
    pub online: bool,
}
