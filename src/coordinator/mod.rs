//! Coordinator - Safety Monitor Facade
//!
//! ## Responsibilities
//!
//! - Compose registry, supervisor, alert buffer and event log
//! - Classify analysis results into alerts (see `classifier`)
//! - Expose the operation surface used by the HTTP API
//!
//! Lookups that name an unknown camera fail with `NotFound` here; the
//! supervisor itself never validates camera ids.

mod classifier;
mod pipeline;

pub use classifier::classify;
pub use pipeline::{AlertPipeline, PipelinePolicy};

use crate::alert_buffer::{Alert, AlertBuffer, AlertStats, DEFAULT_ALERT_CAPACITY};
use crate::analysis_client::{AnalysisClient, AnalysisResult, FrameDescriptor};
use crate::camera_registry::{
    Camera, CameraRegistry, CameraRepository, CameraStatus, CreateCameraRequest,
};
use crate::error::{Error, Result};
use crate::event_log::{CameraLogEntry, EventLog, LogRepository};
use crate::models::{CameraType, ServiceHealth};
use crate::polling_supervisor::{BackoffPolicy, PollingState, PollingSupervisor, PollingTask};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Coordinator tuning
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub alert_capacity: usize,
    pub backoff: BackoffPolicy,
    pub pipeline: PipelinePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            alert_capacity: DEFAULT_ALERT_CAPACITY,
            backoff: BackoffPolicy::default(),
            pipeline: PipelinePolicy::default(),
        }
    }
}

/// Camera with its current polling state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    #[serde(flatten)]
    pub camera: Camera,
    pub polling: PollingState,
}

/// One-shot analysis outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStreamResponse {
    pub result: AnalysisResult,
    pub alert: Option<Alert>,
}

/// Coordinator instance
pub struct Coordinator {
    registry: Arc<CameraRegistry>,
    alerts: Arc<AlertBuffer>,
    event_log: Arc<EventLog>,
    supervisor: Arc<PollingSupervisor>,
    client: Arc<dyn AnalysisClient>,
}

impl Coordinator {
    /// Create new Coordinator
    pub fn new(
        camera_repo: Arc<dyn CameraRepository>,
        log_repo: Arc<dyn LogRepository>,
        client: Arc<dyn AnalysisClient>,
        config: CoordinatorConfig,
    ) -> Self {
        let registry = Arc::new(CameraRegistry::new(camera_repo));
        let alerts = Arc::new(AlertBuffer::new(config.alert_capacity));
        let event_log = Arc::new(EventLog::new(log_repo));
        let pipeline = Arc::new(AlertPipeline::new(
            alerts.clone(),
            event_log.clone(),
            config.pipeline,
        ));
        let supervisor = Arc::new(PollingSupervisor::new(
            registry.clone(),
            client.clone(),
            pipeline,
            config.backoff,
        ));

        Self {
            registry,
            alerts,
            event_log,
            supervisor,
            client,
        }
    }

    /// Load cameras from the store and follow registry changes.
    /// Returns the number of loaded cameras.
    pub async fn init(&self) -> Result<usize> {
        let loaded = self.registry.load().await?;
        self.supervisor
            .spawn_registry_listener(self.registry.subscribe())
            .await;
        Ok(loaded)
    }

    pub fn registry(&self) -> &Arc<CameraRegistry> {
        &self.registry
    }

    pub fn alerts(&self) -> &Arc<AlertBuffer> {
        &self.alerts
    }

    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.event_log
    }

    pub fn supervisor(&self) -> &Arc<PollingSupervisor> {
        &self.supervisor
    }

    // ========================================
    // Cameras
    // ========================================

    pub async fn register_camera(&self, req: CreateCameraRequest) -> Result<Camera> {
        self.registry.register(req).await
    }

    pub async fn get_camera(&self, camera_id: &str) -> Result<CameraView> {
        let camera = self.registry.get(camera_id).await?;
        let polling = self.supervisor.state(camera_id).await;
        Ok(CameraView { camera, polling })
    }

    pub async fn list_cameras(&self) -> Vec<CameraView> {
        let cameras = self.registry.list().await;
        let mut views = Vec::with_capacity(cameras.len());
        for camera in cameras {
            let polling = self.supervisor.state(&camera.id).await;
            views.push(CameraView { camera, polling });
        }
        views
    }

    /// Deactivating a camera also stops its polling loop
    pub async fn set_camera_status(&self, camera_id: &str, status: CameraStatus) -> Result<Camera> {
        let camera = self.registry.set_status(camera_id, status).await?;
        if status == CameraStatus::Inactive {
            self.supervisor.stop(camera_id).await;
        }
        Ok(camera)
    }

    /// Stop polling, deregister and drop the camera's logs
    pub async fn delete_camera(&self, camera_id: &str) -> Result<()> {
        self.registry.get(camera_id).await?;
        self.supervisor.stop(camera_id).await;
        self.registry.delete(camera_id).await?;

        match self.event_log.clear_by_camera(camera_id).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(camera_id = %camera_id, error = %e, "Failed to drop camera logs");
                Err(e)
            }
        }
    }

    // ========================================
    // Alerts
    // ========================================

    pub async fn list_alerts(&self) -> Vec<Alert> {
        self.alerts.list().await
    }

    pub async fn clear_alerts(&self) -> usize {
        let cleared = self.alerts.clear().await;
        tracing::info!(cleared, "Alerts cleared");
        cleared
    }

    pub async fn alert_stats(&self) -> AlertStats {
        self.alerts.stats().await
    }

    // ========================================
    // Logs
    // ========================================

    pub async fn list_logs(&self, camera_id: &str) -> Result<Vec<CameraLogEntry>> {
        self.registry.get(camera_id).await?;
        self.event_log.list_by_camera(camera_id).await
    }

    pub async fn clear_logs(&self, camera_id: &str) -> Result<u64> {
        self.registry.get(camera_id).await?;
        self.event_log.clear_by_camera(camera_id).await
    }

    // ========================================
    // Polling
    // ========================================

    pub async fn start_polling(&self, camera_id: &str) -> Result<PollingTask> {
        let camera = self.registry.get(camera_id).await?;
        Self::ensure_active(&camera)?;
        self.supervisor.start(camera_id).await;
        Ok(self.supervisor.status(camera_id).await)
    }

    pub async fn stop_polling(&self, camera_id: &str) -> Result<PollingTask> {
        self.registry.get(camera_id).await?;
        self.supervisor.stop(camera_id).await;
        Ok(self.supervisor.status(camera_id).await)
    }

    pub async fn toggle_polling(&self, camera_id: &str) -> Result<PollingTask> {
        let camera = self.registry.get(camera_id).await?;
        if !self.supervisor.is_running(camera_id).await {
            Self::ensure_active(&camera)?;
        }
        self.supervisor.toggle(camera_id).await;
        Ok(self.supervisor.status(camera_id).await)
    }

    pub async fn polling_status(&self, camera_id: &str) -> Result<PollingTask> {
        self.registry.get(camera_id).await?;
        Ok(self.supervisor.status(camera_id).await)
    }

    /// Start polling every active camera, returning how many loops were spawned
    pub async fn autostart(&self) -> usize {
        let mut started = 0;
        for camera in self.registry.list().await {
            if camera.status == CameraStatus::Active && self.supervisor.start(&camera.id).await {
                started += 1;
            }
        }
        tracing::info!(started, "Polling autostarted");
        started
    }

    fn ensure_active(camera: &Camera) -> Result<()> {
        if camera.status != CameraStatus::Active {
            return Err(Error::Validation(format!(
                "Camera {} is inactive",
                camera.id
            )));
        }
        Ok(())
    }

    // ========================================
    // Analysis
    // ========================================

    /// Analyse one generated frame without storing the alert or a log entry
    pub async fn process_stream(&self, camera_type: &str) -> Result<ProcessStreamResponse> {
        let camera_type: CameraType = camera_type.parse()?;
        let frame = FrameDescriptor::generate();
        let result = self.client.analyze(camera_type, &frame).await?;
        if result.camera_type() != camera_type {
            return Err(Error::Permanent(format!(
                "{} verdict received from {} service",
                result.camera_type(),
                camera_type
            )));
        }
        let alert = classify(&result, None);

        tracing::debug!(
            camera_type = %camera_type,
            frame_id = frame.frame_id,
            status = result.verdict.status_str(),
            "Stream processed"
        );

        Ok(ProcessStreamResponse { result, alert })
    }

    /// Reachability of every analysis service
    pub async fn service_health(&self) -> Vec<ServiceHealth> {
        let checks = CameraType::ALL.into_iter().map(|camera_type| async move {
            ServiceHealth {
                camera_type,
                online: self.client.health(camera_type).await,
            }
        });
        futures::future::join_all(checks).await
    }

    /// Number of cameras with a live polling loop
    pub async fn polling_count(&self) -> usize {
        self.supervisor.running().await.len()
    }

    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis_client::{AnalysisError, CobotStatus, Verdict};
    use crate::camera_registry::MemoryCameraRepository;
    use crate::event_log::MemoryLogRepository;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Always reports a human near the cobot
    struct SlowDownClient;

    #[async_trait]
    impl AnalysisClient for SlowDownClient {
        async fn analyze(
            &self,
            camera_type: CameraType,
            frame: &FrameDescriptor,
        ) -> std::result::Result<AnalysisResult, AnalysisError> {
            if camera_type != CameraType::Cobot {
                return Err(AnalysisError::Transient("service offline".into()));
            }
            Ok(AnalysisResult {
                verdict: Verdict::Cobot {
                    status: CobotStatus::SlowDown,
                    confidence: 0.95,
                },
                frame_id: frame.frame_id,
                timestamp: frame.timestamp,
            })
        }

        async fn health(&self, camera_type: CameraType) -> bool {
            camera_type == CameraType::Cobot
        }
    }

    async fn coordinator() -> Coordinator {
        let coordinator = Coordinator::new(
            Arc::new(MemoryCameraRepository::new()),
            Arc::new(MemoryLogRepository::new()),
            Arc::new(SlowDownClient),
            CoordinatorConfig::default(),
        );
        coordinator.init().await.unwrap();
        coordinator
            .register_camera(CreateCameraRequest::new("cam2", "Arm", "Cell 3", CameraType::Cobot))
            .await
            .unwrap();
        coordinator
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_raises_alerts_and_logs() {
        let c = coordinator().await;
        let task = c.start_polling("cam2").await.unwrap();
        assert_eq!(task.state, PollingState::Running);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        let alerts = c.list_alerts().await;
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.message == "Human detected near cobot"));
        assert_eq!(c.list_logs("cam2").await.unwrap().len(), 2);

        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_camera_stops_polling_and_drops_logs() {
        let c = coordinator().await;
        c.start_polling("cam2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        c.delete_camera("cam2").await.unwrap();
        assert!(c.list_cameras().await.is_empty());
        assert_eq!(c.polling_count().await, 0);
        assert_eq!(c.event_log().count_by_camera("cam2").await.unwrap(), 0);
        assert!(matches!(c.list_logs("cam2").await, Err(Error::NotFound(_))));

        // alerts already raised stay in the history
        assert_eq!(c.list_alerts().await.len(), 1);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(c.list_alerts().await.len(), 1);

        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_camera_cannot_poll() {
        let c = coordinator().await;
        c.start_polling("cam2").await.unwrap();
        c.set_camera_status("cam2", CameraStatus::Inactive).await.unwrap();
        assert_eq!(c.get_camera("cam2").await.unwrap().polling, PollingState::Stopped);

        assert!(matches!(c.start_polling("cam2").await, Err(Error::Validation(_))));
        assert!(matches!(c.toggle_polling("cam2").await, Err(Error::Validation(_))));

        c.set_camera_status("cam2", CameraStatus::Active).await.unwrap();
        let task = c.toggle_polling("cam2").await.unwrap();
        assert_eq!(task.state, PollingState::Running);

        c.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_camera_operations() {
        let c = coordinator().await;
        assert!(matches!(c.start_polling("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(c.stop_polling("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(c.toggle_polling("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(c.polling_status("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(c.delete_camera("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(c.clear_logs("nope").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_process_stream_does_not_store() {
        let c = coordinator().await;
        let resp = c.process_stream("cobot").await.unwrap();
        assert_eq!(resp.result.camera_type(), CameraType::Cobot);
        let alert = resp.alert.unwrap();
        assert!(alert.camera_id.is_none());
        assert!(c.list_alerts().await.is_empty());

        assert!(matches!(
            c.process_stream("forklift").await,
            Err(Error::InvalidCameraType(_))
        ));
        assert!(matches!(
            c.process_stream("ppe").await,
            Err(Error::Transient(_))
        ));
    }

    #[tokio::test]
    async fn test_service_health_per_type() {
        let c = coordinator().await;
        let health = c.service_health().await;
        assert_eq!(health.len(), 3);
        assert!(health.iter().any(|h| h.camera_type == CameraType::Cobot && h.online));
        assert!(health.iter().any(|h| h.camera_type == CameraType::Ppe && !h.online));
    }

    #[tokio::test(start_paused = true)]
    async fn test_autostart_skips_inactive() {
        let c = coordinator().await;
        c.register_camera(CreateCameraRequest {
            status: Some(CameraStatus::Inactive),
            ..CreateCameraRequest::new("cam3", "Spare", "Cell 4", CameraType::Cobot)
        })
        .await
        .unwrap();

        assert_eq!(c.autostart().await, 1);
        assert_eq!(c.supervisor().running().await, vec!["cam2".to_string()]);

        c.shutdown().await;
    }

    #[tokio::test]
    async fn test_clear_alerts_returns_count() {
        let c = coordinator().await;
        c.alerts()
            .push(classify(
                &AnalysisResult {
                    verdict: Verdict::Cobot {
                        status: CobotStatus::SlowDown,
                        confidence: 0.9,
                    },
                    frame_id: 1,
                    timestamp: chrono::Utc::now(),
                },
                Some("cam2"),
            )
            .unwrap())
            .await;
        assert_eq!(c.alert_stats().await.total, 1);
        assert_eq!(c.clear_alerts().await, 1);
        assert_eq!(c.clear_alerts().await, 0);
    }
}
