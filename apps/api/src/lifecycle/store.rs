//! On-disk bundle store.
//!
//! ```text
//! <root>/
//!   ACTIVE                     version name of the active bundle
//!   LATEST                     version name of the most recently saved bundle
//!   bundles/<version>/
//!     classifier.json
//!     scaler.json
//!     label_encoder.json
//!     metadata.json
//! ```
//!
//! A bundle directory is fully written under a staging name and then renamed
//! into place, and pointer files are replaced through a temp file, so a
//! reader never sees a partial bundle or a truncated pointer.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::features::encoding::LabelEncoder;
use crate::features::scaler::StandardScaler;
use crate::lifecycle::bundle::{BundleMetadata, BundleOrigin, ModelBundle};
use crate::training::forest::RandomForest;

const BUNDLES_DIR: &str = "bundles";
const ACTIVE_POINTER: &str = "ACTIVE";
const LATEST_POINTER: &str = "LATEST";

const CLASSIFIER_FILE: &str = "classifier.json";
const SCALER_FILE: &str = "scaler.json";
const LABEL_ENCODER_FILE: &str = "label_encoder.json";
const METADATA_FILE: &str = "metadata.json";

/// A fitted component tagged with the run that produced it.
#[derive(Serialize, Deserialize)]
struct Artifact<T> {
    bundle_id: Uuid,
    payload: T,
}

/// Listing entry for a stored bundle.
#[derive(Debug, Clone, Serialize)]
pub struct StoredVersion {
    pub version: String,
    pub bundle_id: Uuid,
    pub accuracy: f64,
    pub total_samples: usize,
    pub last_trained: DateTime<Utc>,
    pub origin: BundleOrigin,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct BundleStore {
    root: PathBuf,
}

impl BundleStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ModelError> {
        let root = root.into();
        fs::create_dir_all(root.join(BUNDLES_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bundles_dir(&self) -> PathBuf {
        self.root.join(BUNDLES_DIR)
    }

    fn bundle_dir(&self, version: &str) -> Result<PathBuf, ModelError> {
        if !is_valid_version(version) {
            return Err(ModelError::VersionNotFound(version.to_string()));
        }
        Ok(self.bundles_dir().join(version))
    }

    pub fn contains(&self, version: &str) -> bool {
        self.bundle_dir(version)
            .map(|dir| dir.is_dir())
            .unwrap_or(false)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Save
    // ────────────────────────────────────────────────────────────────────────

    /// Persists `bundle` and points `LATEST` at it. `ACTIVE` is untouched.
    pub fn save(&self, bundle: &ModelBundle) -> Result<PathBuf, ModelError> {
        if bundle.origin() == BundleOrigin::Emergency {
            return Err(ModelError::Artifact(
                "emergency bundles are not persisted".to_string(),
            ));
        }
        let target = self.bundle_dir(bundle.version())?;
        if target.exists() {
            return Err(ModelError::Artifact(format!(
                "bundle {} already exists",
                bundle.version()
            )));
        }

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(self.bundles_dir())?;
        let id = bundle.id();
        write_json(
            &staging.path().join(CLASSIFIER_FILE),
            &Artifact {
                bundle_id: id,
                payload: bundle.classifier(),
            },
        )?;
        write_json(
            &staging.path().join(SCALER_FILE),
            &Artifact {
                bundle_id: id,
                payload: bundle.scaler(),
            },
        )?;
        write_json(
            &staging.path().join(LABEL_ENCODER_FILE),
            &Artifact {
                bundle_id: id,
                payload: bundle.label_encoder(),
            },
        )?;
        write_json(&staging.path().join(METADATA_FILE), bundle.metadata())?;

        fs::rename(staging.path(), &target)?;
        self.write_pointer(LATEST_POINTER, bundle.version())?;
        info!("Saved model bundle {} to {}", bundle.version(), target.display());
        Ok(target)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Load
    // ────────────────────────────────────────────────────────────────────────

    /// Loads a stored bundle. All four artifacts must be present and carry
    /// the same bundle id.
    pub fn load(&self, version: &str) -> Result<ModelBundle, ModelError> {
        let dir = self.bundle_dir(version)?;
        if !dir.is_dir() {
            return Err(ModelError::VersionNotFound(version.to_string()));
        }
        for file in [CLASSIFIER_FILE, SCALER_FILE, LABEL_ENCODER_FILE, METADATA_FILE] {
            if !dir.join(file).is_file() {
                return Err(ModelError::Artifact(format!(
                    "bundle {version} is missing {file}"
                )));
            }
        }

        let metadata: BundleMetadata = read_json(&dir.join(METADATA_FILE))?;
        let classifier: Artifact<RandomForest> = read_json(&dir.join(CLASSIFIER_FILE))?;
        let scaler: Artifact<StandardScaler> = read_json(&dir.join(SCALER_FILE))?;
        let label_encoder: Artifact<LabelEncoder> = read_json(&dir.join(LABEL_ENCODER_FILE))?;

        if metadata.version != version {
            return Err(ModelError::Artifact(format!(
                "bundle directory {version} holds metadata for {}",
                metadata.version
            )));
        }
        let expected = metadata.bundle_id;
        for (file, id) in [
            (CLASSIFIER_FILE, classifier.bundle_id),
            (SCALER_FILE, scaler.bundle_id),
            (LABEL_ENCODER_FILE, label_encoder.bundle_id),
        ] {
            if id != expected {
                return Err(ModelError::Artifact(format!(
                    "{file} in bundle {version} belongs to run {id}, expected {expected}"
                )));
            }
        }

        ModelBundle::new(
            classifier.payload,
            scaler.payload,
            label_encoder.payload,
            metadata,
        )
    }

    /// Loads the bundle named by `ACTIVE`, or `None` when nothing is active.
    pub fn load_active(&self) -> Result<Option<ModelBundle>, ModelError> {
        match self.active_version()? {
            Some(version) => self.load(&version).map(Some),
            None => Ok(None),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Pointers and listing
    // ────────────────────────────────────────────────────────────────────────

    pub fn active_version(&self) -> Result<Option<String>, ModelError> {
        self.read_pointer(ACTIVE_POINTER)
    }

    pub fn latest_version(&self) -> Result<Option<String>, ModelError> {
        self.read_pointer(LATEST_POINTER)
    }

    pub fn set_active(&self, version: &str) -> Result<(), ModelError> {
        if !self.contains(version) {
            return Err(ModelError::VersionNotFound(version.to_string()));
        }
        self.write_pointer(ACTIVE_POINTER, version)
    }

    /// Stored bundles, oldest first. Unreadable entries are skipped.
    pub fn list_versions(&self) -> Result<Vec<StoredVersion>, ModelError> {
        let active = self.active_version()?;
        let mut versions = Vec::new();
        for entry in fs::read_dir(self.bundles_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            let metadata: BundleMetadata = match read_json(&entry.path().join(METADATA_FILE)) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping unreadable bundle {name}: {e}");
                    continue;
                }
            };
            versions.push(StoredVersion {
                active: active.as_deref() == Some(name.as_str()),
                version: name,
                bundle_id: metadata.bundle_id,
                accuracy: metadata.accuracy,
                total_samples: metadata.total_samples,
                last_trained: metadata.last_trained,
                origin: metadata.origin,
            });
        }
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(versions)
    }

    fn read_pointer(&self, name: &str) -> Result<Option<String>, ModelError> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let version = fs::read_to_string(path)?.trim().to_string();
        Ok((!version.is_empty()).then_some(version))
    }

    fn write_pointer(&self, name: &str, version: &str) -> Result<(), ModelError> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        writeln!(tmp, "{version}")?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.root.join(name))
            .map_err(|e| ModelError::Io(e.error))?;
        Ok(())
    }
}

/// Version names are generated, never user paths: `[A-Za-z0-9_-]+`.
fn is_valid_version(version: &str) -> bool {
    !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ModelError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|e| {
        ModelError::Artifact(format!("cannot parse {}: {e}", path.display()))
    })
}
