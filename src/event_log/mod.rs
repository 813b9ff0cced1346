//! EventLog - Per-Camera Analysis Log
//!
//! ## Responsibilities
//!
//! - Append one entry per recorded analysis result
//! - Query / clear / count entries of a camera
//!
//! Entries are append-only; within one camera they appear in the order
//! the polling loop produced them.

mod repository;

pub use repository::{LogRepository, MemoryLogRepository, SqlLogRepository};

use crate::analysis_client::AnalysisResult;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stored log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraLogEntry {
    pub id: i64,
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    /// Verdict status string, e.g. `STOP`
    pub event: String,
    /// Verdict payload
    pub result: serde_json::Value,
}

/// Entry to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub result: serde_json::Value,
}

impl NewLogEntry {
    pub fn from_result(camera_id: impl Into<String>, result: &AnalysisResult) -> Result<Self> {
        Ok(Self {
            camera_id: camera_id.into(),
            timestamp: result.timestamp,
            event: result.verdict.status_str().to_string(),
            result: serde_json::to_value(&result.verdict)?,
        })
    }
}

/// EventLog instance
pub struct EventLog {
    repo: Arc<dyn LogRepository>,
}

impl EventLog {
    pub fn new(repo: Arc<dyn LogRepository>) -> Self {
        Self { repo }
    }

    /// Append an entry, returning its id
    pub async fn append(&self, entry: NewLogEntry) -> Result<i64> {
        let id = self.repo.insert(&entry).await?;
        tracing::debug!(
            camera_id = %entry.camera_id,
            log_id = id,
            event = %entry.event,
            "Camera log appended"
        );
        Ok(id)
    }

    pub async fn list_by_camera(&self, camera_id: &str) -> Result<Vec<CameraLogEntry>> {
        self.repo.list_by_camera(camera_id).await
    }

    pub async fn clear_by_camera(&self, camera_id: &str) -> Result<u64> {
        let removed = self.repo.delete_by_camera(camera_id).await?;
        tracing::info!(camera_id = %camera_id, removed, "Camera logs cleared");
        Ok(removed)
    }

    pub async fn count_by_camera(&self, camera_id: &str) -> Result<u64> {
        self.repo.count_by_camera(camera_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis_client::{MachineStatus, PpeStatus, Verdict};
    use crate::db;

    fn machine_result(status: MachineStatus, hazard_level: f32) -> AnalysisResult {
        AnalysisResult {
            verdict: Verdict::Machine { status, hazard_level },
            frame_id: 11,
            timestamp: Utc::now(),
        }
    }

    async fn sql_log() -> EventLog {
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        db::init_schema(&pool).await.unwrap();
        EventLog::new(Arc::new(SqlLogRepository::new(pool)))
    }

    fn memory_log() -> EventLog {
        EventLog::new(Arc::new(MemoryLogRepository::new()))
    }

    async fn exercise_append_and_list(log: &EventLog) {
        let entry = |camera_id: &str, status, level| {
            NewLogEntry::from_result(camera_id, &machine_result(status, level)).unwrap()
        };
        let first = entry("cam1", MachineStatus::Stop, 0.9);
        let second = entry("cam1", MachineStatus::Ok, 0.1);
        let other = entry("cam2", MachineStatus::Stop, 0.5);

        let id1 = log.append(first).await.unwrap();
        let id2 = log.append(second).await.unwrap();
        log.append(other).await.unwrap();
        assert!(id2 > id1);

        let entries = log.list_by_camera("cam1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, id1);
        assert_eq!(entries[0].event, "STOP");
        assert_eq!(entries[1].event, "OK");
        assert_eq!(entries[0].result["status"], "STOP");
        assert_eq!(entries[0].result["camera_type"], "machine");
        assert_eq!(log.count_by_camera("cam2").await.unwrap(), 1);
    }

    async fn exercise_clear(log: &EventLog) {
        for _ in 0..3 {
            let result = machine_result(MachineStatus::Stop, 0.7);
            let entry = NewLogEntry::from_result("cam1", &result).unwrap();
            log.append(entry).await.unwrap();
        }
        assert_eq!(log.clear_by_camera("cam1").await.unwrap(), 3);
        assert!(log.list_by_camera("cam1").await.unwrap().is_empty());
        assert_eq!(log.clear_by_camera("cam1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sql_append_and_list_oldest_first() {
        exercise_append_and_list(&sql_log().await).await;
    }

    #[tokio::test]
    async fn test_sql_clear_by_camera() {
        exercise_clear(&sql_log().await).await;
    }

    #[tokio::test]
    async fn test_memory_append_and_clear() {
        exercise_append_and_list(&memory_log()).await;
        exercise_clear(&memory_log()).await;
    }

    #[test]
    fn test_entry_from_ppe_result() {
        let result = AnalysisResult {
            verdict: Verdict::Ppe {
                status: PpeStatus::Alert,
                missing_ppe: vec!["helmet".into()],
            },
            frame_id: 3,
            timestamp: Utc::now(),
        };
        let entry = NewLogEntry::from_result("cam4", &result).unwrap();
        assert_eq!(entry.event, "ALERT");
        assert_eq!(entry.result["missing_ppe"][0], "helmet");
        assert_eq!(entry.result["camera_type"], "ppe");
    }

    #[tokio::test]
    async fn test_unknown_camera_has_no_entries() {
        let log = sql_log().await;
        assert!(log.list_by_camera("nobody").await.unwrap().is_empty());
        assert_eq!(log.count_by_camera("nobody").await.unwrap(), 0);
    }
}
