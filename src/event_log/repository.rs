//! EventLog Repository
//!
//! `camera_logs` persistence. The SQL store assigns ids through
//! AUTOINCREMENT; the memory store keeps its own counter.

use super::{CameraLogEntry, NewLogEntry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Camera log persistence operations
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Store an entry and return its id
    async fn insert(&self, entry: &NewLogEntry) -> Result<i64>;

    /// Entries for one camera, oldest first
    async fn list_by_camera(&self, camera_id: &str) -> Result<Vec<CameraLogEntry>>;

    /// Returns the number of removed entries
    async fn delete_by_camera(&self, camera_id: &str) -> Result<u64>;

    async fn count_by_camera(&self, camera_id: &str) -> Result<u64>;
}

/// SQL-backed log repository
#[derive(Clone)]
pub struct SqlLogRepository {
    pool: SqlitePool,
}

impl SqlLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &SqliteRow) -> Result<CameraLogEntry> {
        let result: String = row.try_get("result")?;
        Ok(CameraLogEntry {
            id: row.try_get("id")?,
            camera_id: row.try_get("camera_id")?,
            timestamp: row.try_get("timestamp")?,
            event: row.try_get("event")?,
            result: serde_json::from_str(&result)?,
        })
    }
}

#[async_trait]
impl LogRepository for SqlLogRepository {
    async fn insert(&self, entry: &NewLogEntry) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO camera_logs (camera_id, timestamp, event, result)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&entry.camera_id)
        .bind(entry.timestamp)
        .bind(&entry.event)
        .bind(serde_json::to_string(&entry.result)?)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_by_camera(&self, camera_id: &str) -> Result<Vec<CameraLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, camera_id, timestamp, event, result
            FROM camera_logs
            WHERE camera_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(camera_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn delete_by_camera(&self, camera_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM camera_logs WHERE camera_id = ?")
            .bind(camera_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_by_camera(&self, camera_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM camera_logs WHERE camera_id = ?")
            .bind(camera_id)
            .fetch_one(&self.pool)
            .await?;

        u64::try_from(count).map_err(|e| Error::Internal(format!("negative row count: {}", e)))
    }
}

#[derive(Default)]
struct MemoryLogs {
    next_id: i64,
    by_camera: HashMap<String, Vec<CameraLogEntry>>,
}

/// In-memory log repository
#[derive(Default)]
pub struct MemoryLogRepository {
    inner: Mutex<MemoryLogs>,
}

impl MemoryLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogRepository for MemoryLogRepository {
    async fn insert(&self, entry: &NewLogEntry) -> Result<i64> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .by_camera
            .entry(entry.camera_id.clone())
            .or_default()
            .push(CameraLogEntry {
                id,
                camera_id: entry.camera_id.clone(),
                timestamp: entry.timestamp,
                event: entry.event.clone(),
                result: entry.result.clone(),
            });
        Ok(id)
    }

    async fn list_by_camera(&self, camera_id: &str) -> Result<Vec<CameraLogEntry>> {
        Ok(self
            .inner
            .lock()
            .await
            .by_camera
            .get(camera_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_by_camera(&self, camera_id: &str) -> Result<u64> {
        let removed = self.inner.lock().await.by_camera.remove(camera_id);
        Ok(removed.map(|entries| entries.len() as u64).unwrap_or(0))
    }

    async fn count_by_camera(&self, camera_id: &str) -> Result<u64> {
        Ok(self
            .inner
            .lock()
            .await
            .by_camera
            .get(camera_id)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0))
    }
}
