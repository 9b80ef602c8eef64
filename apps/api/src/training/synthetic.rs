//! Generated training data for bootstrap, and the emergency noise-fit bundle.

use std::collections::BTreeMap;

use chrono::Utc;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::errors::ModelError;
use crate::features::encoding::{CategoricalEncoderStore, LabelEncoder};
use crate::features::scaler::StandardScaler;
use crate::features::schema::FeatureSchema;
use crate::lifecycle::bundle::{version_name, BundleMetadata, BundleOrigin, ModelBundle};
use crate::training::dataset::{Dataset, Value};
use crate::training::forest::{ClassWeight, ForestParams, MaxFeatures, RandomForest};
use crate::training::pipeline::default_salary_table;

pub const SYNTHETIC_SAMPLES: usize = 1000;

const SKILLS: &[&str] = &[
    "skill_python",
    "skill_java",
    "skill_javascript",
    "skill_sql",
    "skill_machine_learning",
    "skill_data_analysis",
    "skill_react",
    "skill_aws",
];

const SOFT_SKILLS: &[&str] = &[
    "skill_communication",
    "skill_leadership",
    "skill_problem_solving",
    "skill_teamwork",
];

/// (column, probability of holding the certification)
const CERTS: &[(&str, f64)] = &[
    ("cert_aws", 0.3),
    ("cert_google_cloud", 0.2),
    ("cert_azure", 0.2),
    ("cert_data_science", 0.25),
];

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn pick<'a>(rng: &mut ChaCha8Rng, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

/// Rule-based role assignment from the generated skill levels.
pub fn assign_role(skill: impl Fn(&str) -> f64) -> &'static str {
    let python = skill("skill_python");
    let ml = skill("skill_machine_learning");
    let analysis = skill("skill_data_analysis");
    let sql = skill("skill_sql");
    let java = skill("skill_java");
    let js = skill("skill_javascript");
    let react = skill("skill_react");
    let aws = skill("skill_aws");

    if ml >= 8.0 && python >= 8.0 {
        "Data Scientist"
    } else if ml >= 7.0 && python >= 7.0 {
        "ML Engineer"
    } else if analysis >= 7.0 && sql >= 7.0 {
        "Data Analyst"
    } else if (java >= 7.0 || js >= 7.0) && react >= 6.0 {
        "Software Engineer"
    } else if aws >= 7.0 && python >= 6.0 {
        "Cloud Engineer"
    } else if sql >= 6.0 && analysis >= 6.0 {
        "Business Analyst"
    } else if skill("skill_leadership") >= 7.0 {
        "Product Manager"
    } else if skill("skill_problem_solving") >= 8.0 {
        "Systems Analyst"
    } else {
        "IT Consultant"
    }
}

fn salary_band(role: &str) -> (f64, f64) {
    match role {
        "Data Scientist" => (80000.0, 150000.0),
        "ML Engineer" => (90000.0, 160000.0),
        "Data Analyst" => (60000.0, 120000.0),
        "Software Engineer" => (70000.0, 140000.0),
        "Cloud Engineer" => (90000.0, 170000.0),
        "Business Analyst" => (65000.0, 130000.0),
        "Product Manager" => (85000.0, 160000.0),
        "IT Consultant" => (70000.0, 140000.0),
        "Systems Analyst" => (60000.0, 120000.0),
        _ => (50000.0, 100000.0),
    }
}

/// Generates a labelled profile table with role-conditioned salary bands.
/// The same `seed` always yields the same rows.
pub fn synthetic_dataset(
    n_samples: usize,
    seed: u64,
    reference_year: i32,
) -> Result<Dataset, ModelError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut columns: Vec<String> = [
        "age",
        "gender",
        "highest_degree",
        "degree_field",
        "institution_tier",
        "gpa_score",
        "graduation_year",
        "years_since_graduation",
        "total_experience_years",
        "additional_certs_count",
        "online_courses_completed",
        "research_publications",
        "professional_network_size",
        "industry",
        "current_role_level",
        "remote_work_percentage",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    columns.extend(SKILLS.iter().chain(SOFT_SKILLS).map(|c| c.to_string()));
    columns.extend(CERTS.iter().map(|(c, _)| c.to_string()));
    columns.extend(
        [
            "education_score",
            "tech_skill_score",
            "soft_skill_score",
            "overall_profile_score",
            "predicted_job_role",
            "salary_min_usd",
            "salary_max_usd",
        ]
        .iter()
        .map(|c| c.to_string()),
    );

    let mut dataset = Dataset::new(columns)?;
    for _ in 0..n_samples {
        let graduation_year = rng.gen_range(2010..=2023);
        let experience = round1(rng.gen_range(0.0..15.0));

        let mut row: Vec<Value> = vec![
            Value::Number(f64::from(rng.gen_range(22..=44))),
            Value::from(pick(&mut rng, &["Male", "Female", "Other"])),
            Value::from(pick(&mut rng, &["High School", "Bachelor", "Master", "PhD"])),
            Value::from(pick(
                &mut rng,
                &["Computer Science", "Engineering", "Business", "Science"],
            )),
            Value::from(pick(&mut rng, &["Tier 1", "Tier 2", "Tier 3"])),
            Value::Number(round1(rng.gen_range(6.0..9.8))),
            Value::Number(f64::from(graduation_year)),
            Value::Number(f64::from(reference_year - graduation_year).max(0.0)),
            Value::Number(experience),
            Value::Number(f64::from(rng.gen_range(0..10))),
            Value::Number(f64::from(rng.gen_range(0..20))),
            Value::Number(f64::from(rng.gen_range(0..5))),
            Value::Number(f64::from(rng.gen_range(50..1000))),
            Value::from(pick(
                &mut rng,
                &["Technology", "Finance", "Healthcare", "Education"],
            )),
            Value::from(pick(&mut rng, &["Entry", "Mid", "Senior", "Lead"])),
            Value::Number(f64::from(rng.gen_range(0..=100))),
        ];

        let mut skills: BTreeMap<&str, f64> = BTreeMap::new();
        for &skill in SKILLS {
            let level = f64::from(rng.gen_range(0..=10));
            skills.insert(skill, level);
            row.push(Value::Number(level));
        }
        for &skill in SOFT_SKILLS {
            let level = f64::from(rng.gen_range(3..=10));
            skills.insert(skill, level);
            row.push(Value::Number(level));
        }
        for &(_, p) in CERTS {
            row.push(Value::from(rng.gen_bool(p)));
        }

        let overall = round1(rng.gen_range(65.0..95.0));
        row.push(Value::Number(round1(rng.gen_range(60.0..100.0))));
        row.push(Value::Number(round1(rng.gen_range(50.0..95.0))));
        row.push(Value::Number(round1(rng.gen_range(60.0..100.0))));
        row.push(Value::Number(overall));

        let role = assign_role(|name| skills.get(name).copied().unwrap_or(0.0));
        let (lo, hi) = salary_band(role);
        let base = rng.gen_range(lo..hi);
        let adjusted = base * (1.0 + experience * 0.05) * (1.0 + (overall - 70.0) / 100.0);
        row.push(Value::from(role));
        row.push(Value::Number((adjusted * 0.8).trunc()));
        row.push(Value::Number((adjusted * 1.2).trunc()));

        dataset.push_row(row)?;
    }
    Ok(dataset)
}

// ────────────────────────────────────────────────────────────────────────────
// Emergency bundle
// ────────────────────────────────────────────────────────────────────────────

pub const EMERGENCY_FEATURES: &[&str] = &[
    "age",
    "gpa_score",
    "total_experience_years",
    "additional_certs_count",
    "skill_python",
    "skill_java",
    "skill_javascript",
    "skill_sql",
    "skill_machine_learning",
    "skill_data_analysis",
    "skill_react",
    "skill_aws",
    "skill_communication",
    "skill_leadership",
    "skill_problem_solving",
    "skill_teamwork",
    "years_since_graduation",
    "education_score",
    "tech_skill_score",
    "soft_skill_score",
    "overall_profile_score",
    "online_courses_completed",
    "research_publications",
    "professional_network_size",
];

const EMERGENCY_SAMPLES: usize = 100;
const EMERGENCY_CLASSES: usize = 10;

/// A forest fitted on uniform noise against placeholder roles. Its answers are
/// meaningless; it only keeps `predict` callable when every training tier
/// has failed.
pub fn emergency_bundle(seed: u64) -> Result<ModelBundle, ModelError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n_features = EMERGENCY_FEATURES.len();

    let x = Array2::from_shape_fn((EMERGENCY_SAMPLES, n_features), |_| {
        rng.gen_range(-1.0..1.0)
    });
    let y: Vec<usize> = (0..EMERGENCY_SAMPLES)
        .map(|i| i % EMERGENCY_CLASSES)
        .collect();

    let params = ForestParams {
        n_estimators: 50,
        max_depth: None,
        min_samples_split: 2,
        min_samples_leaf: 1,
        max_features: MaxFeatures::Sqrt,
        bootstrap: true,
        class_weight: ClassWeight::Uniform,
        seed,
    };
    let scaler = StandardScaler::fit(&x)?;
    let classifier = RandomForest::fit(&scaler.transform(&x)?, &y, EMERGENCY_CLASSES, &params)?;

    let roles: Vec<String> = (0..EMERGENCY_CLASSES)
        .map(|i| format!("Job_Role_{i}"))
        .collect();
    let label_encoder = LabelEncoder::fit(roles.iter().map(String::as_str));

    let bundle_id = Uuid::new_v4();
    let last_trained = Utc::now();
    let metadata = BundleMetadata {
        bundle_id,
        version: format!("{}-emergency", version_name(last_trained, bundle_id)),
        feature_columns: FeatureSchema::new(
            EMERGENCY_FEATURES.iter().map(|c| c.to_string()).collect(),
        )?,
        categorical_mappings: CategoricalEncoderStore::new(),
        salary_data: default_salary_table(),
        job_roles: label_encoder.classes().to_vec(),
        accuracy: 0.0,
        total_samples: EMERGENCY_SAMPLES,
        last_trained,
        origin: BundleOrigin::Emergency,
        dataset_path: None,
        hyperparameters: params,
        report: None,
        feature_importances: BTreeMap::new(),
    };
    ModelBundle::new(classifier, scaler, label_encoder, metadata)
}
