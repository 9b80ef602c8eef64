use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the prediction core (training, persistence, inference).
///
/// Unseen categorical labels are deliberately absent here: they fall back to
/// code 0 and are only logged.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("No model bundle is active")]
    ModelNotLoaded,

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Bootstrap training failed: {0}")]
    Bootstrap(String),

    #[error("Dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Model version not found: {0}")]
    VersionNotFound(String),

    /// The store has no `ACTIVE` pointer; an in-memory bundle may still serve.
    #[error("No stored model bundle is marked active")]
    NothingToReload,

    #[error("Invalid model artifact: {0}")]
    Artifact(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Model error: {0}")]
    Model(ModelError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ModelNotLoaded => AppError::ModelNotLoaded,
            ModelError::Schema(msg) | ModelError::InsufficientData(msg) => {
                AppError::UnprocessableEntity(msg)
            }
            ModelError::DatasetNotFound(path) => {
                AppError::NotFound(format!("Dataset {} not found", path.display()))
            }
            ModelError::VersionNotFound(version) => {
                AppError::NotFound(format!("Model version {version} not found"))
            }
            ModelError::NothingToReload => {
                AppError::Conflict(ModelError::NothingToReload.to_string())
            }
            other => AppError::Model(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::ModelNotLoaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "MODEL_NOT_LOADED",
                "Prediction model is not ready".to_string(),
            ),
            AppError::Model(e) => {
                tracing::error!("Model error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MODEL_ERROR",
                    "A model processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
