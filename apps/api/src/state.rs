use std::sync::Arc;

use crate::config::Config;
use crate::lifecycle::manager::ModelLifecycleManager;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Owns the active model bundle; cheap to clone, shared by every request.
    pub lifecycle: Arc<ModelLifecycleManager>,
}
