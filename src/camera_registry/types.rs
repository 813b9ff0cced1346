//! CameraRegistry data types

use crate::error::{Error, Result};
use crate::models::CameraType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum camera id length
pub const MAX_CAMERA_ID_LEN: usize = 64;

/// Camera operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    #[default]
    Active,
    Inactive,
}

impl CameraStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Active => "active",
            CameraStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(CameraStatus::Active),
            "inactive" => Ok(CameraStatus::Inactive),
            other => Err(Error::Validation(format!("unknown camera status: {}", other))),
        }
    }
}

/// Registered camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub camera_type: CameraType,
    pub status: CameraStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Camera registration request
///
/// `type` stays a string so an unknown type is reported as
/// `InvalidCameraType` rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCameraRequest {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub camera_type: String,
    #[serde(default)]
    pub status: Option<CameraStatus>,
}

impl CreateCameraRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        camera_type: CameraType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
            camera_type: camera_type.as_str().to_string(),
            status: None,
        }
    }

    /// Validate and build the camera record
    pub fn into_camera(self) -> Result<Camera> {
        let id = self.id.trim().to_string();
        if id.is_empty() || id.chars().count() > MAX_CAMERA_ID_LEN {
            return Err(Error::Validation(format!(
                "camera id must be 1-{} characters",
                MAX_CAMERA_ID_LEN
            )));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("camera name must not be empty".to_string()));
        }
        if self.location.trim().is_empty() {
            return Err(Error::Validation("camera location must not be empty".to_string()));
        }
        let camera_type: CameraType = self.camera_type.parse()?;

        let now = Utc::now();
        Ok(Camera {
            id,
            name: self.name.trim().to_string(),
            location: self.location.trim().to_string(),
            camera_type,
            status: self.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Status update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CameraStatus,
}

/// Registry change notification
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Registered(String),
    Deregistered(String),
    StatusChanged {
        camera_id: String,
        status: CameraStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_camera_defaults_active() {
        let camera = CreateCameraRequest::new("cam1", "Press 1", "Hall A", CameraType::Machine)
            .into_camera()
            .unwrap();
        assert_eq!(camera.id, "cam1");
        assert_eq!(camera.camera_type, CameraType::Machine);
        assert_eq!(camera.status, CameraStatus::Active);
    }

    #[test]
    fn test_into_camera_invalid_type() {
        let req = CreateCameraRequest {
            id: "cam1".to_string(),
            name: "x".to_string(),
            location: "y".to_string(),
            camera_type: "forklift".to_string(),
            status: None,
        };
        assert!(matches!(req.into_camera(), Err(Error::InvalidCameraType(_))));
    }

    #[test]
    fn test_into_camera_rejects_long_id() {
        let req = CreateCameraRequest::new("c".repeat(65), "x", "y", CameraType::Ppe);
        assert!(matches!(req.into_camera(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_id_length_counts_characters() {
        // 64 three-byte characters
        let id = "監".repeat(64);
        let camera = CreateCameraRequest::new(id.clone(), "x", "y", CameraType::Ppe)
            .into_camera()
            .unwrap();
        assert_eq!(camera.id, id);

        let req = CreateCameraRequest::new("監".repeat(65), "x", "y", CameraType::Ppe);
        assert!(matches!(req.into_camera(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_into_camera_rejects_blank_name() {
        let req = CreateCameraRequest::new("cam1", "  ", "y", CameraType::Ppe);
        assert!(matches!(req.into_camera(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_request_deserializes_type_field() {
        let req: CreateCameraRequest = serde_json::from_str(
            r#"{"id": "cam2", "name": "Arm", "location": "Cell 3", "type": "cobot"}"#,
        )
        .unwrap();
        assert_eq!(req.camera_type, "cobot");
        assert!(req.status.is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("inactive".parse::<CameraStatus>().unwrap(), CameraStatus::Inactive);
        assert!("paused".parse::<CameraStatus>().is_err());
    }
}
