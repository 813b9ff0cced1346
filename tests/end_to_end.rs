//! End-to-end polling scenarios through the coordinator

use async_trait::async_trait;
use safety_monitor::alert_buffer::Severity;
use safety_monitor::analysis_client::{
    AnalysisClient, AnalysisError, AnalysisResult, FrameDescriptor, MachineStatus, Verdict,
};
use safety_monitor::camera_registry::{
    CameraStatus, CreateCameraRequest, MemoryCameraRepository, SqlCameraRepository,
};
use safety_monitor::coordinator::{Coordinator, CoordinatorConfig};
use safety_monitor::db;
use safety_monitor::event_log::{MemoryLogRepository, SqlLogRepository};
use safety_monitor::models::CameraType;
use safety_monitor::polling_supervisor::PollingState;
use std::sync::Arc;
use std::time::Duration;

/// Machine analyzer that always reports a hazard
struct AlwaysStop;

#[async_trait]
impl AnalysisClient for AlwaysStop {
    async fn analyze(
        &self,
        camera_type: CameraType,
        frame: &FrameDescriptor,
    ) -> Result<AnalysisResult, AnalysisError> {
        assert_eq!(camera_type, CameraType::Machine);
        Ok(AnalysisResult {
            verdict: Verdict::Machine {
                status: MachineStatus::Stop,
                hazard_level: 0.75,
            },
            frame_id: frame.frame_id,
            timestamp: frame.timestamp,
        })
    }

    async fn health(&self, _camera_type: CameraType) -> bool {
        true
    }
}

async fn memory_coordinator() -> Coordinator {
    let coordinator = Coordinator::new(
        Arc::new(MemoryCameraRepository::new()),
        Arc::new(MemoryLogRepository::new()),
        Arc::new(AlwaysStop),
        CoordinatorConfig::default(),
    );
    coordinator.init().await.unwrap();
    coordinator
}

fn machine_camera(id: &str) -> CreateCameraRequest {
    CreateCameraRequest::new(id, "Press line", "Hall B", CameraType::Machine)
}

#[tokio::test(start_paused = true)]
async fn three_ticks_raise_three_alerts_and_logs() {
    let coordinator = memory_coordinator().await;
    coordinator.register_camera(machine_camera("cam1")).await.unwrap();
    coordinator.start_polling("cam1").await.unwrap();

    // ticks at 0s, 5s, 10s
    tokio::time::sleep(Duration::from_millis(10_500)).await;

    let alerts = coordinator.list_alerts().await;
    assert_eq!(alerts.len(), 3);
    for alert in &alerts {
        assert_eq!(alert.severity, Severity::Error);
        assert_eq!(alert.alert_type, CameraType::Machine);
        assert_eq!(alert.camera_id.as_deref(), Some("cam1"));
        assert_eq!(alert.message, "Machine hazard detected (level: 0.75)");
    }

    let logs = coordinator.list_logs("cam1").await.unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|entry| entry.event == "STOP"));
    assert!(logs.windows(2).all(|pair| pair[0].id < pair[1].id));

    let task = coordinator.polling_status("cam1").await.unwrap();
    assert_eq!(task.ticks, 3);
    assert_eq!(task.state, PollingState::Running);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn alert_history_is_bounded() {
    let coordinator = Coordinator::new(
        Arc::new(MemoryCameraRepository::new()),
        Arc::new(MemoryLogRepository::new()),
        Arc::new(AlwaysStop),
        CoordinatorConfig {
            alert_capacity: 4,
            ..Default::default()
        },
    );
    coordinator.init().await.unwrap();
    coordinator.register_camera(machine_camera("cam1")).await.unwrap();
    coordinator.register_camera(machine_camera("cam2")).await.unwrap();
    coordinator.autostart().await;

    tokio::time::sleep(Duration::from_millis(20_500)).await;
    coordinator.shutdown().await;

    assert_eq!(coordinator.list_alerts().await.len(), 4);
    assert_eq!(coordinator.alert_stats().await.total, 4);
    assert_eq!(coordinator.list_logs("cam1").await.unwrap().len(), 5);
    assert_eq!(coordinator.list_logs("cam2").await.unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn deleting_a_camera_stops_it_within_one_tick() {
    let coordinator = memory_coordinator().await;
    coordinator.register_camera(machine_camera("cam1")).await.unwrap();
    coordinator.start_polling("cam1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    // deletion through the registry alone is picked up by the listener
    coordinator.registry().delete("cam1").await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(coordinator.polling_count().await, 0);
    assert!(coordinator.list_cameras().await.is_empty());
    assert_eq!(coordinator.list_alerts().await.len(), 2);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn deactivation_stops_polling() {
    let coordinator = memory_coordinator().await;
    coordinator.register_camera(machine_camera("cam1")).await.unwrap();
    coordinator.start_polling("cam1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    coordinator
        .set_camera_status("cam1", CameraStatus::Inactive)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(coordinator.list_logs("cam1").await.unwrap().len(), 1);
    let view = coordinator.get_camera("cam1").await.unwrap();
    assert_eq!(view.polling, PollingState::Stopped);
    assert_eq!(view.camera.status, CameraStatus::Inactive);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn sqlite_store_survives_restart() {
    let pool = db::connect("sqlite::memory:", 1).await.unwrap();
    db::init_schema(&pool).await.unwrap();

    let build = |pool: sqlx::SqlitePool| {
        Coordinator::new(
            Arc::new(SqlCameraRepository::new(pool.clone())),
            Arc::new(SqlLogRepository::new(pool)),
            Arc::new(AlwaysStop),
            CoordinatorConfig::default(),
        )
    };

    let first = build(pool.clone());
    first.init().await.unwrap();
    first.register_camera(machine_camera("cam1")).await.unwrap();
    first
        .set_camera_status("cam1", CameraStatus::Inactive)
        .await
        .unwrap();
    first.shutdown().await;

    let second = build(pool);
    assert_eq!(second.init().await.unwrap(), 1);
    let view = second.get_camera("cam1").await.unwrap();
    assert_eq!(view.camera.camera_type, CameraType::Machine);
    assert_eq!(view.camera.status, CameraStatus::Inactive);

    second.shutdown().await;
}
