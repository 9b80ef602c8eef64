mod config;
mod errors;
mod features;
mod lifecycle;
mod prediction;
mod routes;
mod state;
mod training;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::lifecycle::manager::{LifecycleSettings, ModelLifecycleManager};
use crate::lifecycle::store::BundleStore;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on invalid env values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting predictor v{}", env!("CARGO_PKG_VERSION"));

    // Open the bundle store
    let store = BundleStore::open(&config.model_dir)
        .with_context(|| format!("cannot open model dir {}", config.model_dir.display()))?;
    info!("Model store at {}", config.model_dir.display());

    // Load or bootstrap the active model before accepting traffic
    let lifecycle = Arc::new(ModelLifecycleManager::new(
        store,
        LifecycleSettings {
            training: config.training_config(),
            dataset_path: config.dataset_path.clone(),
            reference_year: config.reference_year,
        },
    ));
    let init = lifecycle.clone();
    tokio::task::spawn_blocking(move || init.initialize())
        .await
        .context("model initialization task panicked")?
        .context("model initialization failed")?;
    let status = lifecycle.status();
    info!(
        "Model ready: version={} origin={:?} accuracy={:?}",
        status.version.as_deref().unwrap_or("-"),
        status.origin,
        status.accuracy
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        lifecycle,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
