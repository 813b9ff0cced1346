//! HTTP adapter for the cobot / machine / ppe analysis services

use super::{
    AnalysisClient, AnalysisError, AnalysisResult, CobotStatus, FrameDescriptor, MachineStatus,
    PpeStatus, Verdict,
};
use crate::error::{Error, Result};
use crate::models::CameraType;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// Base URL of each analysis service
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisEndpoints {
    pub cobot: String,
    pub machine: String,
    pub ppe: String,
}

impl AnalysisEndpoints {
    pub fn base_url(&self, camera_type: CameraType) -> &str {
        let url = match camera_type {
            CameraType::Cobot => &self.cobot,
            CameraType::Machine => &self.machine,
            CameraType::Ppe => &self.ppe,
        };
        url.trim_end_matches('/')
    }
}

impl Default for AnalysisEndpoints {
    fn default() -> Self {
        Self {
            cobot: "http://cobot-service:5001".to_string(),
            machine: "http://machine-service:5002".to_string(),
            ppe: "http://ppe-service:5003".to_string(),
        }
    }
}

/// Request body sent to `/analyze`
#[derive(Debug, Serialize)]
struct FrameRequest {
    frame_id: u64,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct CobotResponse {
    status: CobotStatus,
    confidence: f32,
    frame_id: u64,
}

#[derive(Debug, Deserialize)]
struct MachineResponse {
    status: MachineStatus,
    hazard_level: f32,
    frame_id: u64,
}

#[derive(Debug, Deserialize)]
struct PpeResponse {
    status: PpeStatus,
    #[serde(default)]
    missing_ppe: Vec<String>,
    frame_id: u64,
}

/// Analysis services client
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    endpoints: AnalysisEndpoints,
}

impl HttpAnalysisClient {
    /// Create new client with the default 10s timeout
    pub fn new(endpoints: AnalysisEndpoints) -> Result<Self> {
        Self::with_timeout(endpoints, Duration::from_secs(10))
    }

    /// Create new client with custom timeout
    pub fn with_timeout(endpoints: AnalysisEndpoints, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoints })
    }

    async fn post_frame(
        &self,
        camera_type: CameraType,
        frame: &FrameDescriptor,
    ) -> std::result::Result<String, AnalysisError> {
        let url = format!("{}/analyze", self.endpoints.base_url(camera_type));
        let body = FrameRequest {
            frame_id: frame.frame_id,
            timestamp: frame.timestamp.to_rfc3339(),
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AnalysisError::Transient(format!("{} request failed: {}", camera_type, e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(camera_type, status));
        }

        resp.text().await.map_err(|e| {
            AnalysisError::Transient(format!("{} body read failed: {}", camera_type, e))
        })
    }
}

/// 4xx: the service rejected the request (Permanent); anything else is Transient
fn status_error(camera_type: CameraType, status: reqwest::StatusCode) -> AnalysisError {
    let msg = format!("{} service returned {}", camera_type, status);
    if status.is_client_error() {
        AnalysisError::Permanent(msg)
    } else {
        AnalysisError::Transient(msg)
    }
}

fn decode<T: DeserializeOwned>(
    camera_type: CameraType,
    body: &str,
) -> std::result::Result<T, AnalysisError> {
    serde_json::from_str(body).map_err(|e| {
        AnalysisError::Permanent(format!("malformed {} response: {}", camera_type, e))
    })
}

/// Decode a service response body into a validated result
pub(crate) fn parse_response(
    camera_type: CameraType,
    frame: &FrameDescriptor,
    body: &str,
) -> std::result::Result<AnalysisResult, AnalysisError> {
    let (verdict, frame_id) = match camera_type {
        CameraType::Cobot => {
            let r: CobotResponse = decode(camera_type, body)?;
            let verdict = Verdict::Cobot {
                status: r.status,
                confidence: r.confidence,
            };
            (verdict, r.frame_id)
        }
        CameraType::Machine => {
            let r: MachineResponse = decode(camera_type, body)?;
            let verdict = Verdict::Machine {
                status: r.status,
                hazard_level: r.hazard_level,
            };
            (verdict, r.frame_id)
        }
        CameraType::Ppe => {
            let r: PpeResponse = decode(camera_type, body)?;
            let verdict = Verdict::Ppe {
                status: r.status,
                missing_ppe: r.missing_ppe,
            };
            (verdict, r.frame_id)
        }
    };

    if frame_id != frame.frame_id {
        return Err(AnalysisError::Permanent(format!(
            "{} response for frame {} while frame {} was requested",
            camera_type, frame_id, frame.frame_id
        )));
    }

    AnalysisResult {
        verdict,
        frame_id,
        timestamp: frame.timestamp,
    }
    .validate()
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(
        &self,
        camera_type: CameraType,
        frame: &FrameDescriptor,
    ) -> std::result::Result<AnalysisResult, AnalysisError> {
        let body = self.post_frame(camera_type, frame).await?;
        let result = parse_response(camera_type, frame, &body)?;

        tracing::debug!(
            camera_type = %camera_type,
            frame_id = result.frame_id,
            status = result.verdict.status_str(),
            "Analysis response received"
        );

        Ok(result)
    }

    async fn health(&self, camera_type: CameraType) -> bool {
        let url = format!("{}/health", self.endpoints.base_url(camera_type));
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(camera_type = %camera_type, error = %e, "Health check failed");
                false
            }
        }
    }
}
