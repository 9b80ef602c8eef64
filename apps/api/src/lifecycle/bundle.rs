//! Model Artifact Bundle: classifier, scaler, label encoder and metadata
//! from one training run, handled as a single immutable unit.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::features::encoding::{CategoricalEncoderStore, LabelEncoder};
use crate::features::scaler::StandardScaler;
use crate::features::schema::FeatureSchema;
use crate::training::forest::{ForestParams, RandomForest};
use crate::training::metrics::ClassificationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleOrigin {
    /// Trained from a caller-supplied dataset.
    Dataset,
    /// Trained from generated data during bootstrap.
    Synthetic,
    /// Fitted on noise to keep `predict` callable. Never persisted.
    Emergency,
}

impl std::fmt::Display for BundleOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BundleOrigin::Dataset => "dataset",
            BundleOrigin::Synthetic => "synthetic",
            BundleOrigin::Emergency => "emergency",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub salary_min_usd: f64,
    pub salary_max_usd: f64,
}

/// Everything about a bundle except the fitted numeric components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub bundle_id: Uuid,
    pub version: String,
    pub feature_columns: FeatureSchema,
    pub categorical_mappings: CategoricalEncoderStore,
    pub salary_data: BTreeMap<String, SalaryRange>,
    pub job_roles: Vec<String>,
    pub accuracy: f64,
    pub total_samples: usize,
    pub last_trained: DateTime<Utc>,
    pub origin: BundleOrigin,
    pub dataset_path: Option<PathBuf>,
    pub hyperparameters: ForestParams,
    #[serde(default)]
    pub report: Option<ClassificationReport>,
    /// Feature name → normalized importance.
    #[serde(default)]
    pub feature_importances: BTreeMap<String, f64>,
}

/// `v<YYYYMMDD_HHMMSS>-<first 8 hex of the bundle id>`
pub fn version_name(trained_at: DateTime<Utc>, bundle_id: Uuid) -> String {
    let hex = bundle_id.simple().to_string();
    format!("v{}-{}", trained_at.format("%Y%m%d_%H%M%S"), &hex[..8])
}

#[derive(Debug, Clone)]
pub struct ModelBundle {
    classifier: RandomForest,
    scaler: StandardScaler,
    label_encoder: LabelEncoder,
    metadata: BundleMetadata,
}

impl ModelBundle {
    /// Assembles a bundle, rejecting components whose shapes disagree.
    pub fn new(
        classifier: RandomForest,
        scaler: StandardScaler,
        label_encoder: LabelEncoder,
        metadata: BundleMetadata,
    ) -> Result<Self, ModelError> {
        let width = metadata.feature_columns.len();
        if classifier.n_features() != width || scaler.n_features() != width {
            return Err(ModelError::Artifact(format!(
                "feature width mismatch: schema {width}, scaler {}, classifier {}",
                scaler.n_features(),
                classifier.n_features()
            )));
        }
        if classifier.n_classes() != label_encoder.len() {
            return Err(ModelError::Artifact(format!(
                "classifier has {} classes, label encoder has {}",
                classifier.n_classes(),
                label_encoder.len()
            )));
        }
        if metadata.job_roles != label_encoder.classes() {
            return Err(ModelError::Artifact(
                "metadata job roles differ from label encoder classes".to_string(),
            ));
        }
        Ok(Self {
            classifier,
            scaler,
            label_encoder,
            metadata,
        })
    }

    pub fn classifier(&self) -> &RandomForest {
        &self.classifier
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn label_encoder(&self) -> &LabelEncoder {
        &self.label_encoder
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.metadata.feature_columns
    }

    pub fn encoders(&self) -> &CategoricalEncoderStore {
        &self.metadata.categorical_mappings
    }

    pub fn id(&self) -> Uuid {
        self.metadata.bundle_id
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn origin(&self) -> BundleOrigin {
        self.metadata.origin
    }

    pub fn accuracy(&self) -> f64 {
        self.metadata.accuracy
    }

    pub fn salary_for(&self, role: &str) -> Option<&SalaryRange> {
        self.metadata.salary_data.get(role)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Small hand-built bundles for tests that must not run real training.

    use super::*;
    use crate::training::forest::{ClassWeight, MaxFeatures};
    use ndarray::array;

    /// Two features (`skill_python`, `highest_degree`), three roles.
    pub fn tiny_bundle(marker: &str) -> ModelBundle {
        let x = array![
            [1.0, 0.0],
            [2.0, 0.0],
            [1.5, 1.0],
            [5.0, 1.0],
            [6.0, 1.0],
            [5.5, 0.0],
            [9.0, 2.0],
            [10.0, 2.0],
            [9.5, 1.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let params = ForestParams {
            n_estimators: 10,
            max_depth: Some(4),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            class_weight: ClassWeight::Balanced,
            seed: 42,
        };
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();
        let classifier = RandomForest::fit(&scaled, &y, 3, &params).unwrap();
        let label_encoder = LabelEncoder::fit(["Data Analyst", "Data Scientist", "ML Engineer"]);

        let mut encoders = CategoricalEncoderStore::new();
        encoders.fit_column("highest_degree", ["Bachelor", "Master", "PhD"]);

        let mut salary_data = BTreeMap::new();
        salary_data.insert(
            "Data Scientist".to_string(),
            SalaryRange {
                salary_min_usd: 80000.0,
                salary_max_usd: 150000.0,
            },
        );

        let bundle_id = Uuid::new_v4();
        let last_trained = Utc::now();
        let metadata = BundleMetadata {
            bundle_id,
            version: format!("{}-{marker}", version_name(last_trained, bundle_id)),
            feature_columns: FeatureSchema::new(vec![
                "skill_python".to_string(),
                "highest_degree".to_string(),
            ])
            .unwrap(),
            categorical_mappings: encoders,
            salary_data,
            job_roles: label_encoder.classes().to_vec(),
            accuracy: 0.9,
            total_samples: 9,
            last_trained,
            origin: BundleOrigin::Dataset,
            dataset_path: None,
            hyperparameters: params,
            report: None,
            feature_importances: BTreeMap::new(),
        };
        ModelBundle::new(classifier, scaler, label_encoder, metadata).unwrap()
    }
}
