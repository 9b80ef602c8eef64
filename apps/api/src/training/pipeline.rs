//! Training Pipeline: dataset → encoded, scaled matrix → forest → bundle.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::Utc;
use ndarray::{Array2, Axis};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::features::encoding::{CategoricalEncoderStore, LabelEncoder};
use crate::features::scaler::StandardScaler;
use crate::features::schema::FeatureSchema;
use crate::lifecycle::bundle::{version_name, BundleMetadata, BundleOrigin, ModelBundle, SalaryRange};
use crate::training::dataset::{ColumnKind, Dataset, Value};
use crate::training::forest::{ForestParams, RandomForest};
use crate::training::metrics::ClassificationReport;
use crate::training::split::stratified_split;

pub const DEFAULT_TARGET_COLUMN: &str = "predicted_job_role";

/// Sentinel for a categorical column with no observed values.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Identifier and post-hoc leakage columns never used as features.
pub const DROPPED_COLUMNS: &[&str] = &[
    "user_id",
    "secondary_job_1",
    "secondary_job_2",
    "secondary_job_3",
    "secondary_job_4",
    "confidence_score",
    "secondary_conf_1",
    "secondary_conf_2",
    "secondary_conf_3",
    "secondary_conf_4",
    "salary_min_usd",
    "salary_max_usd",
    "salary_midpoint_usd",
    "salary_currency",
    "salary_local_min",
    "salary_local_max",
    "missing_skill_1",
    "missing_skill_2",
    "missing_skill_3",
    "training_months_required",
    "upskill_priority",
    "immediate_employability_score",
    "six_month_potential_score",
    "market_demand_score",
    "job_openings_estimate",
    "competition_level",
    "remote_availability_score",
    "location_adjusted_salary_multiplier",
];

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub target_column: String,
    pub drop_columns: Vec<String>,
    pub test_fraction: f64,
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            drop_columns: DROPPED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            test_fraction: 0.2,
            forest: ForestParams::default(),
        }
    }
}

/// Where the training rows came from, recorded in the bundle metadata.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSource<'a> {
    pub origin: BundleOrigin,
    pub path: Option<&'a Path>,
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub accuracy: f64,
    pub report: ClassificationReport,
}

/// Fits a complete bundle from `dataset`. Pure: nothing is persisted here.
pub fn train(
    dataset: &Dataset,
    config: &TrainingConfig,
    source: DatasetSource<'_>,
) -> Result<TrainingOutcome, ModelError> {
    let target_idx = dataset.column_index(&config.target_column).ok_or_else(|| {
        ModelError::Schema(format!(
            "target column '{}' not found in dataset",
            config.target_column
        ))
    })?;

    let dropped: HashSet<&str> = config.drop_columns.iter().map(String::as_str).collect();
    let feature_idx: Vec<usize> = dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != target_idx && !dropped.contains(name.as_str()))
        .map(|(i, _)| i)
        .collect();
    if feature_idx.is_empty() {
        return Err(ModelError::Schema(
            "no feature columns remain after dropping the target and denylisted columns"
                .to_string(),
        ));
    }

    let mut targets = Vec::with_capacity(dataset.n_rows());
    let mut rows = Vec::with_capacity(dataset.n_rows());
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        match row[target_idx].as_label() {
            Some(label) => {
                targets.push(label);
                rows.push(row_idx);
            }
            None => warn!("Skipping row {}: missing target value", row_idx + 1),
        }
    }
    if rows.is_empty() {
        return Err(ModelError::InsufficientData(
            "dataset has no labelled rows".to_string(),
        ));
    }

    // Impute and encode feature columns
    let mut encoders = CategoricalEncoderStore::new();
    let mut x = Array2::<f64>::zeros((rows.len(), feature_idx.len()));
    for (j, &col) in feature_idx.iter().enumerate() {
        let name = &dataset.columns()[col];
        let cells: Vec<&Value> = rows.iter().map(|&r| &dataset.rows()[r][col]).collect();
        match dataset.column_kind(col) {
            ColumnKind::Numeric => {
                let fill = column_mean(&cells);
                for (i, cell) in cells.iter().enumerate() {
                    x[[i, j]] = cell.as_number().unwrap_or(fill);
                }
            }
            ColumnKind::Categorical => {
                let labels: Vec<Option<String>> = cells.iter().map(|c| c.as_label()).collect();
                let fill = column_mode(&labels).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
                let filled: Vec<&str> = labels
                    .iter()
                    .map(|l| l.as_deref().unwrap_or(fill.as_str()))
                    .collect();
                let mapping = encoders.fit_column(name, filled.iter().copied());
                for (i, label) in filled.iter().enumerate() {
                    x[[i, j]] = mapping.get(*label).copied().unwrap_or_default() as f64;
                }
            }
        }
    }

    let label_encoder = LabelEncoder::fit(targets.iter().map(String::as_str));
    if label_encoder.len() < 2 {
        return Err(ModelError::InsufficientData(format!(
            "need at least 2 distinct job roles, found {}",
            label_encoder.len()
        )));
    }
    let y: Vec<usize> = targets
        .iter()
        .map(|t| label_encoder.transform(t).unwrap_or_default())
        .collect();

    let split = stratified_split(&y, label_encoder.len(), config.test_fraction, config.forest.seed)
        .map_err(|e| match e {
            ModelError::InsufficientData(_) => {
                let mut counts = vec![0usize; label_encoder.len()];
                for &c in &y {
                    counts[c] += 1;
                }
                let rare: Vec<&str> = counts
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| **n < 2)
                    .filter_map(|(c, _)| label_encoder.inverse(c))
                    .collect();
                ModelError::InsufficientData(format!(
                    "job role(s) with fewer than 2 samples: {}",
                    rare.join(", ")
                ))
            }
            other => other,
        })?;

    let x_train = x.select(Axis(0), &split.train);
    let x_test = x.select(Axis(0), &split.test);
    let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
    let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();

    let scaler = StandardScaler::fit(&x_train)?;
    let x_train = scaler.transform(&x_train)?;
    let x_test = scaler.transform(&x_test)?;

    info!(
        "Training forest: {} train / {} test rows, {} features, {} roles, {} trees",
        y_train.len(),
        y_test.len(),
        feature_idx.len(),
        label_encoder.len(),
        config.forest.n_estimators
    );
    let classifier = RandomForest::fit(&x_train, &y_train, label_encoder.len(), &config.forest)?;

    let predicted = classifier.predict(&x_test)?;
    let report = ClassificationReport::compute(&y_test, &predicted, label_encoder.classes());
    let accuracy = report.accuracy;
    info!("Held-out accuracy: {:.4}", accuracy);
    for class in &report.classes {
        debug!(
            "  {}: precision={:.3} recall={:.3} f1={:.3} support={}",
            class.label, class.precision, class.recall, class.f1, class.support
        );
    }

    let feature_columns: Vec<String> = feature_idx
        .iter()
        .map(|&i| dataset.columns()[i].clone())
        .collect();
    let feature_importances = feature_columns
        .iter()
        .cloned()
        .zip(classifier.feature_importances().iter().copied())
        .collect();

    let bundle_id = Uuid::new_v4();
    let last_trained = Utc::now();
    let metadata = BundleMetadata {
        bundle_id,
        version: version_name(last_trained, bundle_id),
        feature_columns: FeatureSchema::new(feature_columns)?,
        categorical_mappings: encoders,
        salary_data: salary_table(dataset, &rows, &targets),
        job_roles: label_encoder.classes().to_vec(),
        accuracy,
        total_samples: rows.len(),
        last_trained,
        origin: source.origin,
        dataset_path: source.path.map(Path::to_path_buf),
        hyperparameters: config.forest.clone(),
        report: Some(report.clone()),
        feature_importances,
    };

    let bundle = ModelBundle::new(classifier, scaler, label_encoder, metadata)?;
    Ok(TrainingOutcome {
        bundle,
        accuracy,
        report,
    })
}

fn column_mean(cells: &[&Value]) -> f64 {
    let values: Vec<f64> = cells.iter().filter_map(|c| c.as_number()).collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Most frequent label; ties go to the smallest label.
fn column_mode(labels: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels.iter().flatten() {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label.to_string())
}

/// Built-in salary bands used when the dataset carries no salary columns.
pub fn default_salary_table() -> BTreeMap<String, SalaryRange> {
    [
        ("Data Scientist", 80000.0, 150000.0),
        ("Software Engineer", 70000.0, 140000.0),
        ("Data Analyst", 60000.0, 120000.0),
        ("ML Engineer", 90000.0, 160000.0),
        ("DevOps Engineer", 80000.0, 150000.0),
        ("Business Analyst", 65000.0, 130000.0),
        ("Product Manager", 85000.0, 160000.0),
        ("Cloud Engineer", 90000.0, 170000.0),
    ]
    .into_iter()
    .map(|(role, min, max)| {
        (
            role.to_string(),
            SalaryRange {
                salary_min_usd: min,
                salary_max_usd: max,
            },
        )
    })
    .collect()
}

/// Per-role mean of `salary_min_usd` / `salary_max_usd` when both columns
/// exist, otherwise the built-in table.
fn salary_table(
    dataset: &Dataset,
    rows: &[usize],
    targets: &[String],
) -> BTreeMap<String, SalaryRange> {
    let (Some(min_idx), Some(max_idx)) = (
        dataset.column_index("salary_min_usd"),
        dataset.column_index("salary_max_usd"),
    ) else {
        return default_salary_table();
    };

    #[derive(Default)]
    struct Acc {
        min_sum: f64,
        min_n: usize,
        max_sum: f64,
        max_n: usize,
    }

    let mut acc: BTreeMap<&str, Acc> = BTreeMap::new();
    for (&r, role) in rows.iter().zip(targets) {
        let row = &dataset.rows()[r];
        let entry = acc.entry(role.as_str()).or_default();
        if let Some(v) = row[min_idx].as_number() {
            entry.min_sum += v;
            entry.min_n += 1;
        }
        if let Some(v) = row[max_idx].as_number() {
            entry.max_sum += v;
            entry.max_n += 1;
        }
    }

    acc.into_iter()
        .filter(|(_, a)| a.min_n > 0 && a.max_n > 0)
        .map(|(role, a)| {
            (
                role.to_string(),
                SalaryRange {
                    salary_min_usd: a.min_sum / a.min_n as f64,
                    salary_max_usd: a.max_sum / a.max_n as f64,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            forest: ForestParams {
                n_estimators: 20,
                max_depth: Some(10),
                min_samples_split: 2,
                min_samples_leaf: 1,
                ..ForestParams::default()
            },
            ..TrainingConfig::default()
        }
    }

    fn source() -> DatasetSource<'static> {
        DatasetSource {
            origin: BundleOrigin::Dataset,
            path: None,
        }
    }

    /// 500 rows, 3 roles driven by `skill_score`; `degree` is weakly informative.
    fn three_role_dataset() -> Dataset {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut ds = Dataset::new(vec![
            "skill_score".to_string(),
            "degree".to_string(),
            "user_id".to_string(),
            "predicted_job_role".to_string(),
        ])
        .unwrap();
        for i in 0..500 {
            let role = i % 3;
            let score = role as f64 * 3.0 + rng.gen_range(0.0..2.5);
            let degree = match (role, rng.gen_bool(0.7)) {
                (0, true) => "Bachelor",
                (1, true) => "Master",
                (2, true) => "PhD",
                _ => "Bachelor",
            };
            let label = ["Data Analyst", "Data Scientist", "ML Engineer"][role];
            ds.push_row(vec![
                Value::Number(score),
                Value::from(degree),
                Value::Number(i as f64),
                Value::from(label),
            ])
            .unwrap();
        }
        ds
    }

    #[test]
    fn test_three_role_scenario_beats_random_guess() {
        let outcome = train(&three_role_dataset(), &small_config(), source()).unwrap();
        assert!(outcome.accuracy > 1.0 / 3.0);
        let schema = outcome.bundle.schema();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.columns(), ["skill_score", "degree"]);
        assert!(outcome.bundle.encoders().columns().any(|c| c == "degree"));
        assert_eq!(outcome.bundle.metadata().total_samples, 500);
        assert_eq!(outcome.report.classes.len(), 3);
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let ds = Dataset::from_reader("a,b\n1,x\n2,y\n".as_bytes()).unwrap();
        let err = train(&ds, &small_config(), source()).unwrap_err();
        assert!(matches!(err, ModelError::Schema(_)));
    }

    #[test]
    fn test_single_sample_class_is_insufficient_data() {
        let csv = "x,predicted_job_role\n1,A\n2,A\n3,A\n4,B\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        let err = train(&ds, &small_config(), source()).unwrap_err();
        match err {
            ModelError::InsufficientData(msg) => assert!(msg.contains('B')),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_single_role_is_insufficient_data() {
        let csv = "x,predicted_job_role\n1,A\n2,A\n3,A\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert!(matches!(
            train(&ds, &small_config(), source()),
            Err(ModelError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_denylisted_columns_never_become_features() {
        let csv = "x,salary_min_usd,salary_max_usd,confidence_score,predicted_job_role\n\
                   1,50000,70000,0.9,A\n2,52000,72000,0.8,A\n3,54000,74000,0.7,A\n\
                   7,90000,120000,0.9,B\n8,94000,124000,0.6,B\n9,98000,128000,0.5,B\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        let outcome = train(&ds, &small_config(), source()).unwrap();
        assert_eq!(outcome.bundle.schema().columns(), ["x"]);

        let salary = outcome.bundle.salary_for("A").unwrap();
        assert_eq!(salary.salary_min_usd, 52000.0);
        assert_eq!(salary.salary_max_usd, 72000.0);
    }

    #[test]
    fn test_imputation() {
        let cells = [Value::Number(2.0), Value::Missing, Value::Number(4.0)];
        let refs: Vec<&Value> = cells.iter().collect();
        assert_eq!(column_mean(&refs), 3.0);
        assert_eq!(column_mean(&[&Value::Missing]), 0.0);

        let labels = vec![
            Some("b".to_string()),
            Some("a".to_string()),
            None,
            Some("b".to_string()),
            Some("a".to_string()),
        ];
        assert_eq!(column_mode(&labels).as_deref(), Some("a"));
        assert_eq!(column_mode(&[None, None]), None);
    }

    #[test]
    fn test_sparse_categorical_column_imputed_with_mode() {
        let csv = "x,note,predicted_job_role\n1,,A\n2,,A\n3,,A\n7,,B\n8,,B\n9,,B\n";
        let mut ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        // force categorical: one text cell in an otherwise empty column
        ds.push_row(vec![Value::Number(10.0), Value::from("x"), Value::from("B")])
            .unwrap();
        let outcome = train(&ds, &small_config(), source()).unwrap();
        assert_eq!(outcome.bundle.encoders().code("note", "x"), Some(0));

        let csv = "x,note,predicted_job_role\n1,,A\n2,,A\n3,,A\n7,,B\n8,,B\n9,,B\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        let outcome = train(&ds, &small_config(), source()).unwrap();
        // all-missing column is numeric and imputed with 0
        assert!(outcome.bundle.encoders().columns().all(|c| c != "note"));
    }

    #[test]
    fn test_default_salary_table_without_salary_columns() {
        let outcome = train(&three_role_dataset(), &small_config(), source()).unwrap();
        assert_eq!(outcome.bundle.metadata().salary_data, default_salary_table());
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let ds = three_role_dataset();
        let a = train(&ds, &small_config(), source()).unwrap();
        let b = train(&ds, &small_config(), source()).unwrap();
        assert_eq!(a.accuracy, b.accuracy);
        let probe = [4.0, 1.0];
        assert_eq!(
            a.bundle.classifier().predict_proba_row(&probe).unwrap(),
            b.bundle.classifier().predict_proba_row(&probe).unwrap()
        );
    }
}
