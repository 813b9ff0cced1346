//! In-process analyzer producing random verdicts
//!
//! Mirrors the behaviour of the standalone mock services so the engine can
//! run without them: cobot confidence in [0.8, 1.0], machine hazard level in
//! [0, 1], ppe reports helmet/vest/goggles missing on ALERT.

use super::{
    AnalysisClient, AnalysisError, AnalysisResult, CobotStatus, FrameDescriptor, MachineStatus,
    PpeStatus, Verdict,
};
use crate::models::CameraType;
use async_trait::async_trait;
use rand::Rng;

const MISSING_PPE: [&str; 3] = ["helmet", "vest", "goggles"];

pub struct SimulatedAnalysisClient {
    /// Probability in [0, 1] that a call fails with a transient error
    failure_rate: f64,
}

impl SimulatedAnalysisClient {
    pub fn new() -> Self {
        Self { failure_rate: 0.0 }
    }

    pub fn with_failure_rate(failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    fn draw(&self, camera_type: CameraType) -> Result<Verdict, AnalysisError> {
        let mut rng = rand::thread_rng();

        if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
            return Err(AnalysisError::Transient(format!(
                "simulated {} service unavailable",
                camera_type
            )));
        }

        let unsafe_verdict = rng.gen_bool(0.5);
        let verdict = match camera_type {
            CameraType::Cobot => Verdict::Cobot {
                status: if unsafe_verdict {
                    CobotStatus::SlowDown
                } else {
                    CobotStatus::Ok
                },
                confidence: rng.gen_range(0.8..=1.0),
            },
            CameraType::Machine => Verdict::Machine {
                status: if unsafe_verdict {
                    MachineStatus::Stop
                } else {
                    MachineStatus::Ok
                },
                hazard_level: rng.gen_range(0.0..=1.0),
            },
            CameraType::Ppe => Verdict::Ppe {
                status: if unsafe_verdict {
                    PpeStatus::Alert
                } else {
                    PpeStatus::Ok
                },
                missing_ppe: if unsafe_verdict {
                    MISSING_PPE.iter().map(|s| s.to_string()).collect()
                } else {
                    Vec::new()
                },
            },
        };
        Ok(verdict)
    }
}

impl Default for SimulatedAnalysisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisClient for SimulatedAnalysisClient {
    async fn analyze(
        &self,
        camera_type: CameraType,
        frame: &FrameDescriptor,
    ) -> Result<AnalysisResult, AnalysisError> {
        let verdict = self.draw(camera_type)?;
        AnalysisResult {
            verdict,
            frame_id: frame.frame_id,
            timestamp: frame.timestamp,
        }
        .validate()
    }

    async fn health(&self, _camera_type: CameraType) -> bool {
        true
    }
}
