//! AnalysisClient - Safety Analysis Service Adapter
//!
//! ## Responsibilities
//!
//! - Send frame descriptors to the analysis service of a camera type
//! - Parse and validate verdicts
//! - Classify failures as transient (retry) or permanent (report)
//!
//! Two implementations are provided: [`HttpAnalysisClient`] talks to the
//! remote cobot/machine/ppe services, [`SimulatedAnalysisClient`] draws
//! verdicts locally with the same distributions.

mod http;
mod simulated;

pub use http::{AnalysisEndpoints, HttpAnalysisClient};
pub use simulated::SimulatedAnalysisClient;

use crate::models::CameraType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Frame reference generated by the caller for each analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub frame_id: u64,
    pub timestamp: DateTime<Utc>,
}

impl FrameDescriptor {
    pub fn new(frame_id: u64) -> Self {
        Self {
            frame_id,
            timestamp: Utc::now(),
        }
    }

    /// Random frame id in 1..=1000, stamped now
    pub fn generate() -> Self {
        let frame_id = rand::thread_rng().gen_range(1..=1000);
        Self::new(frame_id)
    }
}

/// Cobot service status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CobotStatus {
    Ok,
    SlowDown,
}

/// Machine service status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Ok,
    Stop,
}

/// PPE service status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PpeStatus {
    Ok,
    Alert,
}

/// Type-specific verdict with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "camera_type", rename_all = "lowercase")]
pub enum Verdict {
    Cobot {
        status: CobotStatus,
        confidence: f32,
    },
    Machine {
        status: MachineStatus,
        hazard_level: f32,
    },
    Ppe {
        status: PpeStatus,
        missing_ppe: Vec<String>,
    },
}

impl Verdict {
    pub fn camera_type(&self) -> CameraType {
        match self {
            Verdict::Cobot { .. } => CameraType::Cobot,
            Verdict::Machine { .. } => CameraType::Machine,
            Verdict::Ppe { .. } => CameraType::Ppe,
        }
    }

    /// Wire status string (OK, SLOW_DOWN, STOP, ALERT)
    pub fn status_str(&self) -> &'static str {
        match self {
            Verdict::Cobot { status: CobotStatus::Ok, .. }
            | Verdict::Machine { status: MachineStatus::Ok, .. }
            | Verdict::Ppe { status: PpeStatus::Ok, .. } => "OK",
            Verdict::Cobot { status: CobotStatus::SlowDown, .. } => "SLOW_DOWN",
            Verdict::Machine { status: MachineStatus::Stop, .. } => "STOP",
            Verdict::Ppe { status: PpeStatus::Alert, .. } => "ALERT",
        }
    }

    /// Confidence (cobot) or hazard level (machine)
    pub fn score(&self) -> Option<f32> {
        match self {
            Verdict::Cobot { confidence, .. } => Some(*confidence),
            Verdict::Machine { hazard_level, .. } => Some(*hazard_level),
            Verdict::Ppe { .. } => None,
        }
    }

    pub fn is_unsafe(&self) -> bool {
        self.status_str() != "OK"
    }
}

/// Result of analysing one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub verdict: Verdict,
    pub frame_id: u64,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn camera_type(&self) -> CameraType {
        self.verdict.camera_type()
    }

    /// Reject scores outside [0, 1]
    pub fn validate(self) -> Result<Self, AnalysisError> {
        if let Some(score) = self.verdict.score() {
            if !(0.0..=1.0).contains(&score) {
                return Err(AnalysisError::Permanent(format!(
                    "{} score {} outside [0, 1]",
                    self.camera_type(),
                    score
                )));
            }
        }
        Ok(self)
    }
}

/// Analysis call failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Network or remote failure, retried with backoff
    #[error("transient: {0}")]
    Transient(String),
    /// Malformed or unexpected response, not retried
    #[error("permanent: {0}")]
    Permanent(String),
}

impl From<AnalysisError> for crate::Error {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Transient(msg) => crate::Error::Transient(msg),
            AnalysisError::Permanent(msg) => crate::Error::Permanent(msg),
        }
    }
}

/// Remote analysis capability
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(
        &self,
        camera_type: CameraType,
        frame: &FrameDescriptor,
    ) -> Result<AnalysisResult, AnalysisError>;

    /// Whether the service for `camera_type` is reachable
    async fn health(&self, camera_type: CameraType) -> bool;
}
