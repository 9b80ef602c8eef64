//! Model Lifecycle Manager: owns the active bundle.
//!
//! Readers take an `Arc` snapshot of the active bundle under a momentary read
//! lock, so a prediction always sees one consistent bundle. Training happens
//! entirely off to the side; the only exclusive step is the pointer swap.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::errors::ModelError;
use crate::features::profile::ProfileInput;
use crate::features::schema::DefaultPolicy;
use crate::lifecycle::bundle::{BundleOrigin, ModelBundle};
use crate::lifecycle::store::{BundleStore, StoredVersion};
use crate::prediction::engine::{InferenceEngine, PredictionRecord};
use crate::training::dataset::Dataset;
use crate::training::metrics::ClassificationReport;
use crate::training::pipeline::{train, DatasetSource, TrainingConfig, TrainingOutcome};
use crate::training::synthetic::{emergency_bundle, synthetic_dataset, SYNTHETIC_SAMPLES};

pub const SYNTHETIC_DATA_FILE: &str = "synthetic_data.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Unloaded,
    Loading,
    Bootstrapping,
    Ready,
    Reloading,
}

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub training: TrainingConfig,
    /// Preferred dataset for bootstrap and retrain.
    pub dataset_path: Option<PathBuf>,
    pub reference_year: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrainRequest {
    pub dataset_path: Option<PathBuf>,
    pub n_estimators: Option<usize>,
    /// `0` means unlimited depth.
    pub max_depth: Option<usize>,
    #[serde(default = "default_activate")]
    pub activate: bool,
}

fn default_activate() -> bool {
    true
}

impl Default for RetrainRequest {
    fn default() -> Self {
        Self {
            dataset_path: None,
            n_estimators: None,
            max_depth: None,
            activate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrainOutcome {
    pub version: String,
    pub accuracy: f64,
    pub total_samples: usize,
    pub features_used: Vec<String>,
    pub dataset_path: PathBuf,
    pub activated: bool,
    pub report: ClassificationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub state: LifecycleState,
    pub loaded: bool,
    pub version: Option<String>,
    pub origin: Option<BundleOrigin>,
    pub accuracy: Option<f64>,
    pub total_samples: Option<usize>,
    pub features_count: Option<usize>,
    pub job_roles_count: Option<usize>,
    pub n_trees: Option<usize>,
    pub categorical_columns: Vec<String>,
    pub last_trained: Option<DateTime<Utc>>,
    pub dataset_path: Option<PathBuf>,
    /// Newest version on disk, which may differ from the active one.
    pub latest_stored_version: Option<String>,
}

pub struct ModelLifecycleManager {
    store: BundleStore,
    settings: LifecycleSettings,
    active: RwLock<Option<Arc<ModelBundle>>>,
    state: RwLock<LifecycleState>,
    /// Serializes retrain/reload/activate; never taken by `predict`.
    write_lock: Mutex<()>,
    known_dataset: RwLock<Option<PathBuf>>,
}

impl ModelLifecycleManager {
    /// Creates an `Unloaded` manager. No I/O or training happens here; call
    /// [`initialize`](Self::initialize) or [`install`](Self::install).
    pub fn new(store: BundleStore, settings: LifecycleSettings) -> Self {
        let known_dataset = settings.dataset_path.clone();
        Self {
            store,
            settings,
            active: RwLock::new(None),
            state: RwLock::new(LifecycleState::Unloaded),
            write_lock: Mutex::new(()),
            known_dataset: RwLock::new(known_dataset),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write();
        debug!("Lifecycle state {:?} -> {:?}", *state, next);
        *state = next;
    }

    fn swap(&self, bundle: Arc<ModelBundle>) {
        info!(
            "Active model bundle is now {} ({}, accuracy {:.4})",
            bundle.version(),
            bundle.origin(),
            bundle.accuracy()
        );
        *self.active.write() = Some(bundle);
    }

    /// Makes `bundle` active in memory without touching the store.
    pub fn install(&self, bundle: ModelBundle) {
        self.swap(Arc::new(bundle));
        self.set_state(LifecycleState::Ready);
    }

    /// Snapshot of the active bundle.
    pub fn active(&self) -> Result<Arc<ModelBundle>, ModelError> {
        self.active.read().clone().ok_or(ModelError::ModelNotLoaded)
    }

    pub fn engine(&self) -> Result<InferenceEngine, ModelError> {
        Ok(InferenceEngine::new(self.active()?, self.policy()))
    }

    pub fn policy(&self) -> DefaultPolicy {
        DefaultPolicy {
            reference_year: self.settings.reference_year,
        }
    }

    pub fn predict(&self, input: &ProfileInput) -> Result<PredictionRecord, ModelError> {
        self.engine()?.predict(input)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Startup
    // ────────────────────────────────────────────────────────────────────────

    /// Loads the active stored bundle, or bootstraps one. Tiers, in order:
    /// stored bundle → configured dataset → synthetic data → emergency
    /// noise-fit bundle. Only fails if even the emergency tier fails.
    pub fn initialize(&self) -> Result<(), ModelError> {
        let _guard = self.write_lock.lock();
        self.set_state(LifecycleState::Loading);

        match self.store.load_active() {
            Ok(Some(bundle)) => {
                info!("Loaded stored model bundle {}", bundle.version());
                if let Some(path) = &bundle.metadata().dataset_path {
                    self.known_dataset.write().get_or_insert_with(|| path.clone());
                }
                self.swap(Arc::new(bundle));
                self.set_state(LifecycleState::Ready);
                return Ok(());
            }
            Ok(None) => info!("No active model bundle in {}", self.store.root().display()),
            Err(e) => warn!("Active model bundle is unusable, bootstrapping: {e}"),
        }

        self.set_state(LifecycleState::Bootstrapping);
        match self.bootstrap() {
            Ok(bundle) => {
                self.swap(Arc::new(bundle));
                self.set_state(LifecycleState::Ready);
                Ok(())
            }
            Err(e) => {
                error!("Bootstrap failed at every tier: {e}");
                self.set_state(LifecycleState::Unloaded);
                Err(e)
            }
        }
    }

    fn bootstrap(&self) -> Result<ModelBundle, ModelError> {
        if let Some(path) = self.settings.dataset_path.as_deref() {
            info!("Bootstrap: training from configured dataset {}", path.display());
            match self.bootstrap_from(path, BundleOrigin::Dataset) {
                Ok(bundle) => return Ok(bundle),
                Err(e) => warn!("Bootstrap from dataset failed, trying synthetic data: {e}"),
            }
        }

        info!("Bootstrap: training from synthetic data");
        match self.train_synthetic() {
            Ok(bundle) => return Ok(bundle),
            Err(e) => warn!("Synthetic bootstrap failed, falling back to emergency model: {e}"),
        }

        warn!("Bootstrap: installing emergency model; predictions are not meaningful");
        emergency_bundle(self.settings.training.forest.seed)
            .map_err(|e| ModelError::Bootstrap(e.to_string()))
    }

    fn train_synthetic(&self) -> Result<ModelBundle, ModelError> {
        let path = self.generate_synthetic_data()?;
        self.bootstrap_from(&path, BundleOrigin::Synthetic)
    }

    /// Bootstrap training. Only a training error moves on to the next tier;
    /// a bundle that trained but could not be stored is still served.
    fn bootstrap_from(&self, path: &Path, origin: BundleOrigin) -> Result<ModelBundle, ModelError> {
        let outcome = self.train_from(path, origin, &self.settings.training)?;
        *self.known_dataset.write() = Some(path.to_path_buf());
        if let Err(e) = self.persist(&outcome.bundle, true) {
            warn!(
                "Bundle {} could not be stored, serving it from memory only: {e}",
                outcome.bundle.version()
            );
        }
        Ok(outcome.bundle)
    }

    fn generate_synthetic_data(&self) -> Result<PathBuf, ModelError> {
        let dataset = synthetic_dataset(
            SYNTHETIC_SAMPLES,
            self.settings.training.forest.seed,
            self.settings.reference_year,
        )?;
        let path = self.store.root().join(SYNTHETIC_DATA_FILE);
        dataset.write_csv(&path)?;
        info!(
            "Synthetic data saved to {} ({} rows)",
            path.display(),
            dataset.n_rows()
        );
        Ok(path)
    }

    fn train_from(
        &self,
        path: &Path,
        origin: BundleOrigin,
        config: &TrainingConfig,
    ) -> Result<TrainingOutcome, ModelError> {
        let dataset = Dataset::from_csv_path(path)?;
        info!(
            "Dataset {} loaded: {} rows x {} columns",
            path.display(),
            dataset.n_rows(),
            dataset.columns().len()
        );
        train(
            &dataset,
            config,
            DatasetSource {
                origin,
                path: Some(path),
            },
        )
    }

    /// Stores `bundle` and, when `activate` is set, points `ACTIVE` at it.
    fn persist(&self, bundle: &ModelBundle, activate: bool) -> Result<(), ModelError> {
        self.store.save(bundle)?;
        if activate {
            self.store.set_active(bundle.version())?;
        }
        Ok(())
    }

    /// Trains from `path` and persists the result. The in-memory swap is left
    /// to the caller.
    fn train_and_persist(
        &self,
        path: &Path,
        origin: BundleOrigin,
        config: &TrainingConfig,
        activate: bool,
    ) -> Result<TrainingOutcome, ModelError> {
        let outcome = self.train_from(path, origin, config)?;
        self.persist(&outcome.bundle, activate)?;
        *self.known_dataset.write() = Some(path.to_path_buf());
        Ok(outcome)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Retrain / reload / activate
    // ────────────────────────────────────────────────────────────────────────

    /// Dataset for a retrain: explicit path, else the last dataset used,
    /// else freshly generated synthetic data.
    fn resolve_dataset(&self, requested: Option<&Path>) -> Result<(PathBuf, BundleOrigin), ModelError> {
        if let Some(path) = requested {
            if !path.is_file() {
                return Err(ModelError::DatasetNotFound(path.to_path_buf()));
            }
            return Ok((path.to_path_buf(), BundleOrigin::Dataset));
        }
        let synthetic = self.store.root().join(SYNTHETIC_DATA_FILE);
        if let Some(path) = self.known_dataset.read().clone() {
            if path.is_file() {
                let origin = if path == synthetic {
                    BundleOrigin::Synthetic
                } else {
                    BundleOrigin::Dataset
                };
                return Ok((path, origin));
            }
        }
        if synthetic.is_file() {
            return Ok((synthetic, BundleOrigin::Synthetic));
        }
        Ok((self.generate_synthetic_data()?, BundleOrigin::Synthetic))
    }

    /// Trains a new bundle and, on success, swaps it in. On any failure the
    /// previously active bundle stays active.
    pub fn retrain(&self, request: RetrainRequest) -> Result<RetrainOutcome, ModelError> {
        let _guard = self.write_lock.lock();
        let previous = self.state();
        self.set_state(LifecycleState::Reloading);

        let result = self.retrain_locked(&request);

        self.set_state(if self.active.read().is_some() {
            LifecycleState::Ready
        } else {
            previous
        });
        if let Err(e) = &result {
            match self.active.read().as_ref() {
                Some(bundle) => warn!("Retrain failed, keeping bundle {}: {e}", bundle.version()),
                None => warn!("Retrain failed: {e}"),
            }
        }
        result
    }

    fn retrain_locked(&self, request: &RetrainRequest) -> Result<RetrainOutcome, ModelError> {
        let (path, origin) = self.resolve_dataset(request.dataset_path.as_deref())?;

        let mut config = self.settings.training.clone();
        if let Some(n) = request.n_estimators {
            config.forest.n_estimators = n;
        }
        if let Some(depth) = request.max_depth {
            config.forest.max_depth = (depth > 0).then_some(depth);
        }

        info!(
            "Retraining from {} (n_estimators={}, max_depth={:?})",
            path.display(),
            config.forest.n_estimators,
            config.forest.max_depth
        );
        let TrainingOutcome {
            bundle,
            accuracy,
            report,
        } = self.train_and_persist(&path, origin, &config, request.activate)?;

        let outcome = RetrainOutcome {
            version: bundle.version().to_string(),
            accuracy,
            total_samples: bundle.metadata().total_samples,
            features_used: bundle.schema().columns().to_vec(),
            dataset_path: path,
            activated: request.activate,
            report,
        };
        if request.activate {
            self.swap(Arc::new(bundle));
        } else {
            info!("Bundle {} stored but not activated", outcome.version);
        }
        Ok(outcome)
    }

    /// Re-reads the `ACTIVE` bundle from the store and swaps it in. With no
    /// `ACTIVE` pointer (e.g. after an emergency bootstrap) the in-memory
    /// bundle keeps serving and `NothingToReload` is returned.
    pub fn reload(&self) -> Result<String, ModelError> {
        let _guard = self.write_lock.lock();
        let previous = self.state();
        self.set_state(LifecycleState::Reloading);
        let result = self
            .store
            .load_active()
            .and_then(|bundle| bundle.ok_or(ModelError::NothingToReload));
        let outcome = result.map(|bundle| {
            let version = bundle.version().to_string();
            self.swap(Arc::new(bundle));
            version
        });
        self.set_state(if self.active.read().is_some() {
            LifecycleState::Ready
        } else {
            previous
        });
        outcome
    }

    /// Activates a stored bundle by version.
    pub fn activate(&self, version: &str) -> Result<(), ModelError> {
        let _guard = self.write_lock.lock();
        let bundle = self.store.load(version)?;
        self.store.set_active(version)?;
        self.swap(Arc::new(bundle));
        self.set_state(LifecycleState::Ready);
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Introspection
    // ────────────────────────────────────────────────────────────────────────

    pub fn status(&self) -> ModelStatus {
        let state = self.state();
        let latest_stored_version = self.store.latest_version().unwrap_or_else(|e| {
            warn!("Cannot read latest version pointer: {e}");
            None
        });
        match self.active.read().clone() {
            Some(bundle) => {
                let meta = bundle.metadata();
                ModelStatus {
                    state,
                    loaded: true,
                    version: Some(meta.version.clone()),
                    origin: Some(meta.origin),
                    accuracy: Some(meta.accuracy),
                    total_samples: Some(meta.total_samples),
                    features_count: Some(meta.feature_columns.len()),
                    job_roles_count: Some(meta.job_roles.len()),
                    n_trees: Some(bundle.classifier().n_trees()),
                    categorical_columns: bundle.encoders().columns().map(str::to_string).collect(),
                    last_trained: Some(meta.last_trained),
                    dataset_path: meta.dataset_path.clone(),
                    latest_stored_version,
                }
            }
            None => ModelStatus {
                state,
                loaded: false,
                version: None,
                origin: None,
                accuracy: None,
                total_samples: None,
                features_count: None,
                job_roles_count: None,
                n_trees: None,
                categorical_columns: Vec::new(),
                last_trained: None,
                dataset_path: None,
                latest_stored_version,
            },
        }
    }

    pub fn versions(&self) -> Result<Vec<StoredVersion>, ModelError> {
        self.store.list_versions()
    }
}
