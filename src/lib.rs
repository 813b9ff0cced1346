//! Safety Monitor Library
//!
//! Multi-source safety-event aggregation and alerting engine.
//!
//! ## Architecture (6 Components)
//!
//! 1. AnalysisClient - cobot / machine / ppe analysis service adapter
//! 2. AlertBuffer - bounded newest-first alert history
//! 3. CameraRegistry - authoritative camera set
//! 4. PollingSupervisor - one polling loop per camera, with backoff
//! 5. EventLog - per-camera append-only analysis log
//! 6. Coordinator - classification and the public operation surface
//!
//! WebAPI exposes the coordinator over HTTP.

pub mod alert_buffer;
pub mod analysis_client;
pub mod camera_registry;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod event_log;
pub mod models;
pub mod polling_supervisor;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
