//! PollingSupervisor - Per-Camera Polling Loops
//!
//! ## Responsibilities
//!
//! - Keep at most one live polling loop per camera id
//! - Start / stop / toggle loops, report their state
//! - Back off exponentially on transient analysis failures
//! - Follow registry changes (deregistration, deactivation)
//!
//! ## State machine
//!
//! ```text
//! Stopped ──start──> Running ──transient error──> CrashBackoff
//!    ^                 │  ^                            │
//!    └──────stop───────┘  └────────success─────────────┘
//! ```
//!
//! A permanent error (unusable response) is retried at the base interval
//! and leaves the state unchanged.
//!
//! Each loop owns a child of the supervisor's root `CancellationToken`;
//! both the inter-tick sleep and the analysis call race against it, so no
//! analysis request is issued once `stop` has been called.

mod backoff;

pub use backoff::{BackoffPolicy, DEFAULT_MAX_DELAY, DEFAULT_MAX_EXPONENT, DEFAULT_POLL_INTERVAL};

use crate::analysis_client::{AnalysisClient, AnalysisError, AnalysisResult, FrameDescriptor};
use crate::camera_registry::{Camera, CameraRegistry, CameraStatus, RegistryEvent};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Consumer of successful analysis results
#[async_trait]
pub trait AnalysisSink: Send + Sync {
    async fn on_result(&self, camera: &Camera, result: AnalysisResult) -> Result<()>;
}

/// Loop state of one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PollingState {
    #[default]
    Stopped,
    Running,
    CrashBackoff,
}

/// Polling task snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingTask {
    pub camera_id: String,
    pub state: PollingState,
    pub consecutive_failures: u32,
    /// Analysis calls issued since the loop started
    pub ticks: u64,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl PollingTask {
    fn stopped(camera_id: &str) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            state: PollingState::Stopped,
            consecutive_failures: 0,
            ticks: 0,
            last_error: None,
            started_at: None,
        }
    }
}

struct TaskSlot {
    token: CancellationToken,
    handle: JoinHandle<()>,
    task: Arc<RwLock<PollingTask>>,
}

impl TaskSlot {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Everything a loop needs, cloned into each spawned task
#[derive(Clone)]
struct LoopContext {
    registry: Arc<CameraRegistry>,
    client: Arc<dyn AnalysisClient>,
    sink: Arc<dyn AnalysisSink>,
    policy: BackoffPolicy,
}

/// PollingSupervisor instance
pub struct PollingSupervisor {
    ctx: LoopContext,
    tasks: Mutex<HashMap<String, TaskSlot>>,
    root: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl PollingSupervisor {
    /// Create new PollingSupervisor
    pub fn new(
        registry: Arc<CameraRegistry>,
        client: Arc<dyn AnalysisClient>,
        sink: Arc<dyn AnalysisSink>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            ctx: LoopContext {
                registry,
                client,
                sink,
                policy,
            },
            tasks: Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
            listener: Mutex::new(None),
        }
    }

    /// Start polling a camera. Returns whether a new loop was spawned.
    pub async fn start(&self, camera_id: &str) -> bool {
        let mut tasks = self.tasks.lock().await;
        self.spawn_locked(&mut tasks, camera_id)
    }

    /// Stop polling a camera. Returns whether a live loop was stopped.
    pub async fn stop(&self, camera_id: &str) -> bool {
        let slot = self.tasks.lock().await.remove(camera_id);
        match slot {
            Some(slot) => {
                let was_live = slot.is_live();
                Self::terminate(camera_id, slot).await;
                if was_live {
                    tracing::info!(camera_id = %camera_id, "Polling stopped");
                }
                was_live
            }
            None => false,
        }
    }

    /// Flip between Running and Stopped, returning the new state
    pub async fn toggle(&self, camera_id: &str) -> PollingState {
        let mut tasks = self.tasks.lock().await;
        let live = tasks.get(camera_id).map(TaskSlot::is_live).unwrap_or(false);

        if live {
            let slot = tasks.remove(camera_id);
            drop(tasks);
            if let Some(slot) = slot {
                Self::terminate(camera_id, slot).await;
            }
            tracing::info!(camera_id = %camera_id, "Polling toggled off");
            PollingState::Stopped
        } else if self.spawn_locked(&mut tasks, camera_id) {
            PollingState::Running
        } else {
            PollingState::Stopped
        }
    }

    /// Snapshot of a camera's task; a stopped snapshot when none is live
    pub async fn status(&self, camera_id: &str) -> PollingTask {
        let task = {
            let tasks = self.tasks.lock().await;
            match tasks.get(camera_id) {
                Some(slot) if slot.is_live() => Some(slot.task.clone()),
                Some(slot) => {
                    let mut snapshot = slot.task.read().await.clone();
                    snapshot.state = PollingState::Stopped;
                    return snapshot;
                }
                None => None,
            }
        };

        match task {
            Some(task) => task.read().await.clone(),
            None => PollingTask::stopped(camera_id),
        }
    }

    pub async fn state(&self, camera_id: &str) -> PollingState {
        self.status(camera_id).await.state
    }

    pub async fn is_running(&self, camera_id: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(camera_id)
            .map(TaskSlot::is_live)
            .unwrap_or(false)
    }

    /// Camera ids with a live loop, sorted
    pub async fn running(&self) -> Vec<String> {
        let tasks = self.tasks.lock().await;
        let mut ids: Vec<String> = tasks
            .iter()
            .filter(|(_, slot)| slot.is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stop every loop when the registry deregisters or deactivates its camera
    pub async fn spawn_registry_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<RegistryEvent>,
    ) {
        let supervisor = Arc::clone(self);
        let root = self.root.clone();

        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = root.cancelled() => break,
                    event = events.recv() => event,
                };

                match event {
                    Ok(RegistryEvent::Deregistered(camera_id)) => {
                        supervisor.stop(&camera_id).await;
                    }
                    Ok(RegistryEvent::StatusChanged {
                        camera_id,
                        status: CameraStatus::Inactive,
                    }) => {
                        supervisor.stop(&camera_id).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Registry listener lagged, reconciling");
                        supervisor.reconcile().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("Registry listener stopped");
        });

        if let Some(previous) = self.listener.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Stop loops whose camera is gone or inactive
    pub async fn reconcile(&self) {
        for camera_id in self.running().await {
            let keep = match self.ctx.registry.get(&camera_id).await {
                Ok(camera) => camera.status == CameraStatus::Active,
                Err(_) => false,
            };
            if !keep {
                self.stop(&camera_id).await;
            }
        }
    }

    /// Cancel every loop and wait for all of them to finish
    pub async fn shutdown(&self) {
        self.root.cancel();

        let slots: Vec<(String, TaskSlot)> = self.tasks.lock().await.drain().collect();
        let count = slots.len();
        futures::future::join_all(
            slots
                .into_iter()
                .map(|(camera_id, slot)| async move { Self::terminate(&camera_id, slot).await }),
        )
        .await;

        if let Some(listener) = self.listener.lock().await.take() {
            if let Err(e) = listener.await {
                tracing::warn!(error = %e, "Registry listener ended abnormally");
            }
        }

        tracing::info!(loops = count, "Polling supervisor shut down");
    }

    fn spawn_locked(&self, tasks: &mut HashMap<String, TaskSlot>, camera_id: &str) -> bool {
        if self.root.is_cancelled() {
            tracing::warn!(camera_id = %camera_id, "Supervisor shut down, not starting polling");
            return false;
        }
        if tasks.get(camera_id).map(TaskSlot::is_live).unwrap_or(false) {
            tracing::debug!(camera_id = %camera_id, "Polling already running");
            return false;
        }

        let token = self.root.child_token();
        let task = Arc::new(RwLock::new(PollingTask {
            started_at: Some(Utc::now()),
            state: PollingState::Running,
            ..PollingTask::stopped(camera_id)
        }));

        let handle = tokio::spawn(run_loop(
            self.ctx.clone(),
            camera_id.to_string(),
            token.clone(),
            task.clone(),
        ));

        tasks.insert(camera_id.to_string(), TaskSlot { token, handle, task });
        tracing::info!(camera_id = %camera_id, "Polling started");
        true
    }

    async fn terminate(camera_id: &str, slot: TaskSlot) {
        slot.token.cancel();
        if let Err(e) = slot.handle.await {
            tracing::error!(camera_id = %camera_id, error = %e, "Polling loop ended abnormally");
        }
    }
}

async fn run_loop(
    ctx: LoopContext,
    camera_id: String,
    token: CancellationToken,
    task: Arc<RwLock<PollingTask>>,
) {
    loop {
        if token.is_cancelled() {
            break;
        }

        let camera = match ctx.registry.get(&camera_id).await {
            Ok(camera) if camera.status == CameraStatus::Active => camera,
            Ok(_) => {
                tracing::info!(camera_id = %camera_id, "Camera inactive, polling loop exiting");
                break;
            }
            Err(_) => {
                tracing::info!(camera_id = %camera_id, "Camera deregistered, polling loop exiting");
                break;
            }
        };

        let frame = FrameDescriptor::generate();
        task.write().await.ticks += 1;

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            outcome = ctx.client.analyze(camera.camera_type, &frame) => outcome,
        };

        let delay = match outcome {
            Ok(result) => {
                {
                    let mut t = task.write().await;
                    t.consecutive_failures = 0;
                    t.state = PollingState::Running;
                }
                if let Err(e) = ctx.sink.on_result(&camera, result).await {
                    tracing::error!(
                        camera_id = %camera_id,
                        error = %e,
                        "Failed to record analysis result"
                    );
                    task.write().await.last_error = Some(e.to_string());
                }
                ctx.policy.base
            }
            Err(AnalysisError::Transient(msg)) => {
                let failures = {
                    let mut t = task.write().await;
                    t.consecutive_failures = t.consecutive_failures.saturating_add(1);
                    t.state = PollingState::CrashBackoff;
                    t.last_error = Some(msg.clone());
                    t.consecutive_failures
                };
                let delay = ctx.policy.delay_for(failures);
                tracing::warn!(
                    camera_id = %camera_id,
                    failures,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %msg,
                    "Analysis failed, backing off"
                );
                delay
            }
            Err(AnalysisError::Permanent(msg)) => {
                // not a success: state and failure count stay as they are
                task.write().await.last_error = Some(msg.clone());
                tracing::error!(
                    camera_id = %camera_id,
                    frame_id = frame.frame_id,
                    error = %msg,
                    "Unusable analysis response"
                );
                ctx.policy.base
            }
        };

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    task.write().await.state = PollingState::Stopped;
    tracing::debug!(camera_id = %camera_id, "Polling loop exited");
}
