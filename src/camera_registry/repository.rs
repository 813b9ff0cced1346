//! CameraRegistry Repository
//!
//! Persistence of camera records. `SqlCameraRepository` is the durable
//! store, `MemoryCameraRepository` keeps records in process memory.

use super::types::{Camera, CameraStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Camera persistence operations
#[async_trait]
pub trait CameraRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Camera>>;

    async fn insert(&self, camera: &Camera) -> Result<()>;

    async fn update_status(
        &self,
        camera_id: &str,
        status: CameraStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Returns whether a row was removed
    async fn delete(&self, camera_id: &str) -> Result<bool>;
}

/// SQL-backed camera repository
#[derive(Clone)]
pub struct SqlCameraRepository {
    pool: SqlitePool,
}

impl SqlCameraRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_camera(row: &SqliteRow) -> Result<Camera> {
        let camera_type: String = row.try_get("type")?;
        let status: String = row.try_get("status")?;
        Ok(Camera {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            location: row.try_get("location")?,
            camera_type: camera_type
                .parse()
                .map_err(|_| Error::Internal(format!("stored camera has type {}", camera_type)))?,
            status: status
                .parse()
                .map_err(|_| Error::Internal(format!("stored camera has status {}", status)))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl CameraRepository for SqlCameraRepository {
    async fn list(&self) -> Result<Vec<Camera>> {
        let rows = sqlx::query(
            "SELECT id, name, location, type, status, created_at, updated_at FROM cameras ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_camera).collect()
    }

    async fn insert(&self, camera: &Camera) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO cameras (id, name, location, type, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&camera.id)
        .bind(&camera.name)
        .bind(&camera.location)
        .bind(camera.camera_type.as_str())
        .bind(camera.status.as_str())
        .bind(camera.created_at)
        .bind(camera.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(Error::Duplicate(
                format!("Camera {} already exists", camera.id),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_status(
        &self,
        camera_id: &str,
        status: CameraStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE cameras SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(updated_at)
            .bind(camera_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Camera {} not found", camera_id)));
        }
        Ok(())
    }

    async fn delete(&self, camera_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cameras WHERE id = ?")
            .bind(camera_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory camera repository
#[derive(Default)]
pub struct MemoryCameraRepository {
    cameras: RwLock<HashMap<String, Camera>>,
}

impl MemoryCameraRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CameraRepository for MemoryCameraRepository {
    async fn list(&self) -> Result<Vec<Camera>> {
        let mut cameras: Vec<Camera> = self.cameras.read().await.values().cloned().collect();
        cameras.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(cameras)
    }

    async fn insert(&self, camera: &Camera) -> Result<()> {
        let mut cameras = self.cameras.write().await;
        if cameras.contains_key(&camera.id) {
            return Err(Error::Duplicate(format!("Camera {} already exists", camera.id)));
        }
        cameras.insert(camera.id.clone(), camera.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        camera_id: &str,
        status: CameraStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut cameras = self.cameras.write().await;
        let camera = cameras
            .get_mut(camera_id)
            .ok_or_else(|| Error::NotFound(format!("Camera {} not found", camera_id)))?;
        camera.status = status;
        camera.updated_at = updated_at;
        Ok(())
    }

    async fn delete(&self, camera_id: &str) -> Result<bool> {
        Ok(self.cameras.write().await.remove(camera_id).is_some())
    }
}
