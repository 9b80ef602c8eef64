use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status plus the model lifecycle state.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let status = state.lifecycle.status();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "predictor",
        "model": {
            "state": status.state,
            "loaded": status.loaded,
            "version": status.version,
        }
    }))
}
