//! API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::camera_registry::{CreateCameraRequest, UpdateStatusRequest};
use crate::error::Error;
use crate::models::{ApiResponse, CameraType, HealthResponse};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(health_check))
        .route("/api/services/health", get(services_health))
        // Cameras
        .route("/api/cameras", get(list_cameras).post(create_camera))
        .route("/api/cameras/:id", get(get_camera).delete(delete_camera))
        .route("/api/cameras/:id/status", put(update_camera_status))
        // Camera logs
        .route("/api/cameras/:id/logs", get(list_logs).delete(clear_logs))
        // Polling lifecycle
        .route("/api/cameras/:id/polling", get(polling_status))
        .route("/api/cameras/:id/polling/start", post(start_polling))
        .route("/api/cameras/:id/polling/stop", post(stop_polling))
        .route("/api/cameras/:id/polling/toggle", post(toggle_polling))
        // Alerts
        .route("/api/alerts", get(list_alerts).delete(clear_alerts))
        .route("/api/alerts/stats", get(alert_stats))
        // One-shot analysis
        .route("/api/process_stream", post(process_stream))
        // Unprefixed aliases of the toggle and one-shot analysis endpoints
        .route("/cameras/:id/simulate", post(toggle_polling))
        .route("/process_stream", post(process_stream))
        .with_state(state)
}

// ========================================
// Health
// ========================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let coordinator = &state.coordinator;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.uptime_sec(),
        cameras: coordinator.registry().len().await,
        polling: coordinator.polling_count().await,
    })
}

async fn services_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.coordinator.service_health().await))
}

// ========================================
// Cameras
// ========================================

async fn list_cameras(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.coordinator.list_cameras().await))
}

async fn create_camera(
    State(state): State<AppState>,
    Json(req): Json<CreateCameraRequest>,
) -> Result<impl IntoResponse, Error> {
    let camera = state.coordinator.register_camera(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(camera))))
}

async fn get_camera(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let view = state.coordinator.get_camera(&id).await?;
    Ok(Json(ApiResponse::success(view)))
}

async fn update_camera_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, Error> {
    let camera = state.coordinator.set_camera_status(&id, req.status).await?;
    Ok(Json(ApiResponse::success(camera)))
}

async fn delete_camera(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    state.coordinator.delete_camera(&id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": id }))))
}

// ========================================
// Logs
// ========================================

async fn list_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let logs = state.coordinator.list_logs(&id).await?;
    Ok(Json(ApiResponse::success(logs)))
}

async fn clear_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let cleared = state.coordinator.clear_logs(&id).await?;
    Ok(Json(ApiResponse::success(json!({ "cleared": cleared }))))
}

// ========================================
// Polling
// ========================================

async fn polling_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let task = state.coordinator.polling_status(&id).await?;
    Ok(Json(ApiResponse::success(task)))
}

async fn start_polling(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let task = state.coordinator.start_polling(&id).await?;
    Ok(Json(ApiResponse::success(task)))
}

async fn stop_polling(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let task = state.coordinator.stop_polling(&id).await?;
    Ok(Json(ApiResponse::success(task)))
}

async fn toggle_polling(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let task = state.coordinator.toggle_polling(&id).await?;
    Ok(Json(ApiResponse::success(task)))
}

// ========================================
// Alerts
// ========================================

async fn list_alerts(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.coordinator.list_alerts().await))
}

async fn clear_alerts(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.coordinator.clear_alerts().await;
    Json(ApiResponse::success(json!({ "cleared": cleared })))
}

async fn alert_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.coordinator.alert_stats().await))
}

// ========================================
// Analysis
// ========================================

#[derive(Debug, Deserialize)]
struct ProcessStreamRequest {
    #[serde(default = "default_stream_camera_type")]
    camera_type: String,
}

fn default_stream_camera_type() -> String {
    CameraType::Cobot.to_string()
}

async fn process_stream(
    State(state): State<AppState>,
    Json(req): Json<ProcessStreamRequest>,
) -> Result<impl IntoResponse, Error> {
    let resp = state.coordinator.process_stream(&req.camera_type).await?;
    Ok(Json(ApiResponse::success(resp)))
}
