//! Application state
//!
//! Holds all shared components and state

use crate::analysis_client::{AnalysisClient, HttpAnalysisClient, SimulatedAnalysisClient};
use crate::camera_registry::{CameraRepository, MemoryCameraRepository, SqlCameraRepository};
use crate::config::{AnalysisMode, AppConfig};
use crate::coordinator::Coordinator;
use crate::db;
use crate::error::Result;
use crate::event_log::{LogRepository, MemoryLogRepository, SqlLogRepository};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Coordinator (registry, polling, alerts, logs)
    pub coordinator: Arc<Coordinator>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, coordinator: Arc<Coordinator>) -> Self {
        Self {
            config,
            coordinator,
            started_at: Instant::now(),
        }
    }

    /// Open the store, pick the analysis client and initialise the coordinator
    pub async fn build(config: AppConfig) -> Result<Self> {
        let camera_repo: Arc<dyn CameraRepository>;
        let log_repo: Arc<dyn LogRepository>;
        if config.uses_memory_store() {
            tracing::warn!("Using in-memory store, data is lost on exit");
            camera_repo = Arc::new(MemoryCameraRepository::new());
            log_repo = Arc::new(MemoryLogRepository::new());
        } else {
            let pool = db::connect(&config.database_url, 5).await?;
            db::init_schema(&pool).await?;
            tracing::info!("Database connected");
            camera_repo = Arc::new(SqlCameraRepository::new(pool.clone()));
            log_repo = Arc::new(SqlLogRepository::new(pool));
        }

        let client: Arc<dyn AnalysisClient> = match config.analysis_mode {
            AnalysisMode::Http => Arc::new(HttpAnalysisClient::with_timeout(
                config.endpoints.clone(),
                config.analysis_timeout,
            )?),
            AnalysisMode::Simulated => Arc::new(SimulatedAnalysisClient::with_failure_rate(
                config.simulated_failure_rate,
            )),
        };

        let coordinator = Arc::new(Coordinator::new(
            camera_repo,
            log_repo,
            client,
            config.coordinator_config(),
        ));
        let loaded = coordinator.init().await?;
        tracing::info!(cameras = loaded, mode = %config.analysis_mode, "Coordinator ready");

        Ok(Self::new(config, coordinator))
    }

    pub fn uptime_sec(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
