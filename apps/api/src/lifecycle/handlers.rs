use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::lifecycle::manager::{ModelStatus, RetrainOutcome, RetrainRequest};
use crate::lifecycle::store::StoredVersion;
use crate::state::AppState;

#[derive(Serialize)]
pub struct VersionListResponse {
    pub versions: Vec<StoredVersion>,
}

#[derive(Serialize)]
pub struct ActivationResponse {
    pub version: String,
    pub status: ModelStatus,
}

/// GET /api/v1/model/status
pub async fn handle_model_status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.lifecycle.status())
}

/// GET /api/v1/model/versions
pub async fn handle_list_versions(
    State(state): State<AppState>,
) -> Result<Json<VersionListResponse>, AppError> {
    let lifecycle = state.lifecycle.clone();
    let versions = tokio::task::spawn_blocking(move || lifecycle.versions())
        .await
        .map_err(anyhow::Error::from)??;
    Ok(Json(VersionListResponse { versions }))
}

/// POST /api/v1/model/retrain
///
/// Training is CPU-bound and runs on the blocking pool; predictions keep
/// being served from the current bundle until the swap.
pub async fn handle_retrain(
    State(state): State<AppState>,
    Json(req): Json<RetrainRequest>,
) -> Result<Json<RetrainOutcome>, AppError> {
    if req.n_estimators == Some(0) {
        return Err(AppError::Validation(
            "n_estimators must be positive".to_string(),
        ));
    }
    let lifecycle = state.lifecycle.clone();
    let outcome = tokio::task::spawn_blocking(move || lifecycle.retrain(req))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(Json(outcome))
}

/// POST /api/v1/model/reload
pub async fn handle_reload(
    State(state): State<AppState>,
) -> Result<Json<ActivationResponse>, AppError> {
    let lifecycle = state.lifecycle.clone();
    let version = tokio::task::spawn_blocking(move || lifecycle.reload())
        .await
        .map_err(anyhow::Error::from)??;
    Ok(Json(ActivationResponse {
        version,
        status: state.lifecycle.status(),
    }))
}

/// POST /api/v1/model/versions/:version/activate
pub async fn handle_activate_version(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> Result<Json<ActivationResponse>, AppError> {
    let lifecycle = state.lifecycle.clone();
    let target = version.clone();
    tokio::task::spawn_blocking(move || lifecycle.activate(&target))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(Json(ActivationResponse {
        version,
        status: state.lifecycle.status(),
    }))
}
