use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::features::profile::{derive_profile_scores, validate_profile, ProfileInput};
use crate::prediction::engine::PredictionRecord;
use crate::state::AppState;

/// POST /api/v1/predictions
///
/// Accepts a flat profile object. Derived scores are added before inference;
/// unknown keys are ignored and missing ones defaulted by the engine.
pub async fn handle_predict(
    State(state): State<AppState>,
    Json(mut profile): Json<ProfileInput>,
) -> Result<Json<PredictionRecord>, AppError> {
    let year = state.config.reference_year;
    validate_profile(&profile, year).map_err(AppError::Validation)?;
    derive_profile_scores(&mut profile, year);

    let record = state.lifecycle.predict(&profile)?;
    tracing::debug!(
        "Prediction {} ({:.2}%) from model {}",
        record.top_prediction,
        record.confidence_score,
        record.model_version
    );
    Ok(Json(record))
}
