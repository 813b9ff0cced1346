//! Error handling for the safety monitor

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown camera id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Camera id already registered
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Camera type outside cobot/machine/ppe
    #[error("Invalid camera type: {0}")]
    InvalidCameraType(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote analysis call failed (retryable)
    #[error("Transient analysis error: {0}")]
    Transient(String),

    /// Malformed or unexpected analysis response (not retried)
    #[error("Permanent analysis error: {0}")]
    Permanent(String),

    /// Store unavailable or query failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::Duplicate(_) => "DUPLICATE",
            Error::InvalidCameraType(_) => "INVALID_CAMERA_TYPE",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Transient(_) => "TRANSIENT_ERROR",
            Error::Permanent(_) => "PERMANENT_ERROR",
            Error::Persistence(_) => "PERSISTENCE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Duplicate(_) => StatusCode::CONFLICT,
            Error::InvalidCameraType(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Transient(_) | Error::Permanent(_) => StatusCode::BAD_GATEWAY,
            Error::Persistence(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request error"
            );
        } else {
            tracing::debug!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
