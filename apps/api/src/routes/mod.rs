pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::lifecycle::handlers as model;
use crate::prediction::handlers as prediction;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Predictions
        .route("/api/v1/predictions", post(prediction::handle_predict))
        // Model lifecycle
        .route("/api/v1/model/status", get(model::handle_model_status))
        .route("/api/v1/model/versions", get(model::handle_list_versions))
        .route("/api/v1/model/retrain", post(model::handle_retrain))
        .route("/api/v1/model/reload", post(model::handle_reload))
        .route(
            "/api/v1/model/versions/:version/activate",
            post(model::handle_activate_version),
        )
        .with_state(state)
}
