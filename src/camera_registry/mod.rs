//! CameraRegistry - Authoritative Camera Set
//!
//! ## Responsibilities
//!
//! - Register / look up / update / deregister cameras
//! - Keep an in-memory cache in front of the `CameraRepository`
//! - Publish `RegistryEvent`s so polling follows registry changes
//!
//! Writers are serialized by a separate lock held across the repository
//! call; the cache lock is only taken to read or swap map entries, so a
//! slow store never blocks lookups.

mod repository;
mod types;

pub use repository::{CameraRepository, MemoryCameraRepository, SqlCameraRepository};
pub use types::*;

use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Camera registry
pub struct CameraRegistry {
    repo: Arc<dyn CameraRepository>,
    cache: RwLock<HashMap<String, Camera>>,
    writes: Mutex<()>,
    events: broadcast::Sender<RegistryEvent>,
}

impl CameraRegistry {
    /// Create registry with an empty cache; call `load()` to fill it
    pub fn new(repo: Arc<dyn CameraRepository>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            repo,
            cache: RwLock::new(HashMap::new()),
            writes: Mutex::new(()),
            events,
        }
    }

    /// Replace the cache with the repository contents
    pub async fn load(&self) -> Result<usize> {
        let _writer = self.writes.lock().await;
        let cameras = self.repo.list().await?;
        let mut cache = self.cache.write().await;
        cache.clear();
        for camera in cameras {
            cache.insert(camera.id.clone(), camera);
        }

        tracing::info!("CameraRegistry cache loaded: {} cameras", cache.len());
        Ok(cache.len())
    }

    /// Register a new camera
    pub async fn register(&self, req: CreateCameraRequest) -> Result<Camera> {
        let camera = req.into_camera()?;

        let _writer = self.writes.lock().await;
        if self.cache.read().await.contains_key(&camera.id) {
            return Err(Error::Duplicate(format!(
                "Camera {} already exists",
                camera.id
            )));
        }
        self.repo.insert(&camera).await?;
        self.cache
            .write()
            .await
            .insert(camera.id.clone(), camera.clone());

        tracing::info!(
            camera_id = %camera.id,
            camera_type = %camera.camera_type,
            location = %camera.location,
            "Camera registered"
        );
        self.publish(RegistryEvent::Registered(camera.id.clone()));

        Ok(camera)
    }

    pub async fn get(&self, camera_id: &str) -> Result<Camera> {
        self.cache
            .read()
            .await
            .get(camera_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Camera {} not found", camera_id)))
    }

    /// All cameras sorted by id
    pub async fn list(&self) -> Vec<Camera> {
        let mut cameras: Vec<Camera> = self.cache.read().await.values().cloned().collect();
        cameras.sort_by(|a, b| a.id.cmp(&b.id));
        cameras
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Update camera status
    pub async fn set_status(&self, camera_id: &str, status: CameraStatus) -> Result<Camera> {
        let _writer = self.writes.lock().await;
        let mut updated = self.get(camera_id).await?;
        if updated.status == status {
            return Ok(updated);
        }

        let now = Utc::now();
        self.repo.update_status(camera_id, status, now).await?;
        updated.status = status;
        updated.updated_at = now;
        self.cache
            .write()
            .await
            .insert(camera_id.to_string(), updated.clone());

        tracing::info!(camera_id = %camera_id, status = %status, "Camera status changed");
        self.publish(RegistryEvent::StatusChanged {
            camera_id: camera_id.to_string(),
            status,
        });

        Ok(updated)
    }

    /// Deregister a camera, returning the removed record
    pub async fn delete(&self, camera_id: &str) -> Result<Camera> {
        let _writer = self.writes.lock().await;
        self.get(camera_id).await?;

        if !self.repo.delete(camera_id).await? {
            tracing::warn!(camera_id = %camera_id, "Camera missing from store during delete");
        }
        let removed = self
            .cache
            .write()
            .await
            .remove(camera_id)
            .ok_or_else(|| Error::Internal(format!("Camera {} vanished from cache", camera_id)))?;

        tracing::info!(camera_id = %camera_id, "Camera deregistered");
        self.publish(RegistryEvent::Deregistered(camera_id.to_string()));

        Ok(removed)
    }

    /// Receiver for subsequent registry events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: RegistryEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }
}
