//! Error types for wildwatch-da
//!
//! Every handler failure is rendered as
//! `{"error": {"code": ..., "message": ...}}` with a status per variant.

use crate::services::carousel::CarouselError;
use crate::services::detection_controller::DetectionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request content rejected by the pipeline (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// An async phase is already running (409)
    #[error("Already in progress: {0}")]
    AlreadyInProgress(String),

    /// Operation not legal in the current phase (409)
    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    /// Alert requested for a safe or unresolved species (422)
    #[error("Not dangerous: {0}")]
    NotDangerous(String),

    /// Upstream classifier failure (502)
    #[error("Server error: {0}")]
    ServiceError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyInProgress(_) | ApiError::InvalidPhase(_) => StatusCode::CONFLICT,
            ApiError::NotDangerous(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ServiceError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::AlreadyInProgress(_) => "ALREADY_IN_PROGRESS",
            ApiError::InvalidPhase(_) => "INVALID_PHASE",
            ApiError::NotDangerous(_) => "NOT_DANGEROUS",
            ApiError::ServiceError(_) => "SERVICE_ERROR",
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(e: DetectionError) -> Self {
        match e {
            DetectionError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            DetectionError::ServiceError(msg) => ApiError::ServiceError(msg),
            DetectionError::NotDangerous(msg) => ApiError::NotDangerous(msg),
            e @ DetectionError::AlreadyInProgress(_) => ApiError::AlreadyInProgress(e.to_string()),
            e @ DetectionError::InvalidPhase(_) => ApiError::InvalidPhase(e.to_string()),
        }
    }
}

impl From<CarouselError> for ApiError {
    fn from(e: CarouselError) -> Self {
        ApiError::NotFound(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::InvalidInput(msg)
            | ApiError::NotFound(msg)
            | ApiError::AlreadyInProgress(msg)
            | ApiError::InvalidPhase(msg)
            | ApiError::NotDangerous(msg)
            | ApiError::ServiceError(msg) => msg,
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
