//! AlertBuffer - Bounded Alert History (Ring Buffer)
//!
//! ## Responsibilities
//!
//! - Keep the most recent alerts, newest first
//! - Evict the oldest alert once capacity is exceeded
//! - Provide alert statistics by camera type and severity

use crate::models::CameraType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::RwLock;

/// Default number of alerts kept in memory
pub const DEFAULT_ALERT_CAPACITY: usize = 100;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Safety alert raised from an unsafe verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: CameraType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
}

/// Alert counts for the dashboard statistics panel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: usize,
    pub by_type: BTreeMap<CameraType, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

/// Ring buffer for alerts. The front is the newest entry.
struct AlertRing {
    alerts: VecDeque<Alert>,
    capacity: usize,
}

impl AlertRing {
    /// Storage grows with use; only the bound is fixed up front
    fn new(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::new(),
            capacity,
        }
    }

    fn push(&mut self, alert: Alert) -> Option<Alert> {
        self.alerts.push_front(alert);
        if self.alerts.len() > self.capacity {
            self.alerts.pop_back()
        } else {
            None
        }
    }

    fn stats(&self) -> AlertStats {
        let mut stats = AlertStats {
            total: self.alerts.len(),
            ..Default::default()
        };
        for alert in &self.alerts {
            *stats.by_type.entry(alert.alert_type).or_default() += 1;
            *stats.by_severity.entry(alert.severity).or_default() += 1;
        }
        stats
    }
}

/// AlertBuffer instance
pub struct AlertBuffer {
    ring: RwLock<AlertRing>,
}

impl AlertBuffer {
    /// Create a buffer holding at most `capacity` alerts (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: RwLock::new(AlertRing::new(capacity)),
        }
    }

    /// Insert at the head, evicting the oldest alert when full
    pub async fn push(&self, alert: Alert) {
        let mut ring = self.ring.write().await;
        if let Some(evicted) = ring.push(alert) {
            tracing::debug!(
                evicted_type = %evicted.alert_type,
                evicted_at = %evicted.timestamp,
                "Alert evicted from buffer"
            );
        }
    }

    /// All alerts, newest first
    pub async fn list(&self) -> Vec<Alert> {
        self.ring.read().await.alerts.iter().cloned().collect()
    }

    /// Remove every alert, returning how many were dropped
    pub async fn clear(&self) -> usize {
        let mut ring = self.ring.write().await;
        let dropped = ring.alerts.len();
        ring.alerts.clear();
        dropped
    }

    pub async fn len(&self) -> usize {
        self.ring.read().await.alerts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ring.read().await.alerts.is_empty()
    }

    pub async fn capacity(&self) -> usize {
        self.ring.read().await.capacity
    }

    pub async fn stats(&self) -> AlertStats {
        self.ring.read().await.stats()
    }
}

impl Default for AlertBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn alert(n: usize) -> Alert {
        Alert {
            alert_type: CameraType::Machine,
            camera_id: Some("cam1".to_string()),
            message: format!("alert {}", n),
            timestamp: Utc::now(),
            severity: Severity::Error,
        }
    }

    #[tokio::test]
    async fn test_newest_first() {
        let buffer = AlertBuffer::new(10);
        buffer.push(alert(1)).await;
        buffer.push(alert(2)).await;
        buffer.push(alert(3)).await;

        let messages: Vec<_> = buffer.list().await.into_iter().map(|a| a.message).collect();
        assert_eq!(messages, vec!["alert 3", "alert 2", "alert 1"]);
    }

    #[tokio::test]
    async fn test_overflow_keeps_most_recent() {
        let capacity = 5;
        let buffer = AlertBuffer::new(capacity);
        for n in 0..capacity + 3 {
            buffer.push(alert(n)).await;
            assert!(buffer.len().await <= capacity);
        }

        let messages: Vec<_> = buffer.list().await.into_iter().map(|a| a.message).collect();
        assert_eq!(
            messages,
            vec!["alert 7", "alert 6", "alert 5", "alert 4", "alert 3"]
        );
    }

    #[tokio::test]
    async fn test_capacity_one() {
        let buffer = AlertBuffer::new(1);
        buffer.push(alert(1)).await;
        buffer.push(alert(2)).await;
        let list = buffer.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].message, "alert 2");
    }

    #[tokio::test]
    async fn test_zero_capacity_clamped() {
        let buffer = AlertBuffer::new(0);
        assert_eq!(buffer.capacity().await, 1);
    }

    #[tokio::test]
    async fn test_huge_capacity_allocates_lazily() {
        let buffer = AlertBuffer::new(usize::MAX);
        assert_eq!(buffer.capacity().await, usize::MAX);
        assert_eq!(buffer.ring.read().await.alerts.capacity(), 0);

        buffer.push(alert(1)).await;
        assert_eq!(buffer.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let buffer = AlertBuffer::default();
        buffer.push(alert(1)).await;
        buffer.push(alert(2)).await;
        assert_eq!(buffer.clear().await, 2);
        assert!(buffer.is_empty().await);
        assert_eq!(buffer.capacity().await, DEFAULT_ALERT_CAPACITY);
    }

    #[tokio::test]
    async fn test_concurrent_pushes_not_lost() {
        let buffer = Arc::new(AlertBuffer::new(1000));
        let mut handles = Vec::new();
        for writer in 0..8 {
            let buffer = buffer.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..50 {
                    buffer.push(alert(writer * 100 + n)).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let list = buffer.list().await;
        assert_eq!(list.len(), 400);
        let mut messages: Vec<_> = list.into_iter().map(|a| a.message).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), 400);
    }

    #[tokio::test]
    async fn test_stats() {
        let buffer = AlertBuffer::new(10);
        buffer.push(alert(1)).await;
        buffer
            .push(Alert {
                alert_type: CameraType::Cobot,
                camera_id: None,
                message: "Human detected near cobot".to_string(),
                timestamp: Utc::now(),
                severity: Severity::Warning,
            })
            .await;

        let stats = buffer.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_type.get(&CameraType::Machine), Some(&1));
        assert_eq!(stats.by_type.get(&CameraType::Cobot), Some(&1));
        assert_eq!(stats.by_type.get(&CameraType::Ppe), None);
        assert_eq!(stats.by_severity.get(&Severity::Warning), Some(&1));
    }

    #[test]
    fn test_alert_serializes_type_field() {
        let json = serde_json::to_value(alert(1)).unwrap();
        assert_eq!(json["type"], "machine");
        assert_eq!(json["severity"], "error");
    }
}
