//! Result pipeline run on every successful polling tick

use super::classifier::classify;
use crate::alert_buffer::{Alert, AlertBuffer};
use crate::analysis_client::AnalysisResult;
use crate::camera_registry::Camera;
use crate::error::{Error, Result};
use crate::event_log::{EventLog, NewLogEntry};
use crate::polling_supervisor::AnalysisSink;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelinePolicy {
    /// Also append a log entry for OK verdicts
    pub log_safe_verdicts: bool,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            log_safe_verdicts: true,
        }
    }
}

/// Classifies results, raises alerts and appends camera logs
pub struct AlertPipeline {
    alerts: Arc<AlertBuffer>,
    event_log: Arc<EventLog>,
    policy: PipelinePolicy,
}

impl AlertPipeline {
    pub fn new(alerts: Arc<AlertBuffer>, event_log: Arc<EventLog>, policy: PipelinePolicy) -> Self {
        Self {
            alerts,
            event_log,
            policy,
        }
    }

    /// Record one result for `camera`, returning the alert it raised.
    ///
    /// The alert is pushed before the log append, so a store failure still
    /// leaves the alert visible.
    pub async fn process(&self, camera: &Camera, result: &AnalysisResult) -> Result<Option<Alert>> {
        if result.camera_type() != camera.camera_type {
            return Err(Error::Permanent(format!(
                "{} verdict received for {} camera {}",
                result.camera_type(),
                camera.camera_type,
                camera.id
            )));
        }

        let alert = classify(result, Some(&camera.id));
        if let Some(alert) = &alert {
            tracing::warn!(
                camera_id = %camera.id,
                severity = ?alert.severity,
                message = %alert.message,
                "Safety alert raised"
            );
            self.alerts.push(alert.clone()).await;
        }

        if result.verdict.is_unsafe() || self.policy.log_safe_verdicts {
            let entry = NewLogEntry::from_result(camera.id.clone(), result)?;
            self.event_log.append(entry).await?;
        }

        Ok(alert)
    }
}

#[async_trait]
impl AnalysisSink for AlertPipeline {
    async fn on_result(&self, camera: &Camera, result: AnalysisResult) -> Result<()> {
        self.process(camera, &result).await.map(|_| ())
    }
}
