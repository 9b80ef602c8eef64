//! Feature Schema: the ordered column list that defines the positional
//! contract between training and inference.
//!
//! Column order is load-bearing: it is the order the scaler and classifier
//! were fitted in. The caller's map order never matters; `reorder` is the only
//! place a profile becomes a vector.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::features::profile::{FieldValue, ProfileInput, CERT_PREFIX, SKILL_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self, ModelError> {
        if columns.is_empty() {
            return Err(ModelError::Schema(
                "feature schema must contain at least one column".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ModelError::Schema(format!(
                    "duplicate feature column '{column}'"
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Default filling
// ────────────────────────────────────────────────────────────────────────────

/// Mid-scale value for an unreported skill on the 0–10 scale.
pub const DEFAULT_SKILL_LEVEL: f64 = 5.0;
pub const DEFAULT_AGE: f64 = 25.0;
pub const DEFAULT_GPA: f64 = 7.5;
pub const DEFAULT_EXPERIENCE_YEARS: f64 = 3.0;
pub const DEFAULT_YEARS_SINCE_GRADUATION: f64 = 5.0;

/// Parameters for synthesizing values of schema columns the caller omitted.
#[derive(Debug, Clone, Copy)]
pub struct DefaultPolicy {
    /// Year `years_since_graduation` is measured against.
    pub reference_year: i32,
}

/// Default for a schema column absent from the profile.
///
/// Stable contract, so older clients keep working as the schema grows:
/// - `skill_*` → 5 (mid-scale)
/// - `cert_*` → 0 (not held)
/// - `age` → 25, `gpa_score` → 7.5, `total_experience_years` → 3
/// - `years_since_graduation` → reference year minus `graduation_year` when
///   present, otherwise 5
/// - everything else → 0
pub fn default_value(column: &str, profile: &ProfileInput, policy: DefaultPolicy) -> f64 {
    if column.starts_with(SKILL_PREFIX) {
        return DEFAULT_SKILL_LEVEL;
    }
    if column.starts_with(CERT_PREFIX) {
        return 0.0;
    }
    match column {
        "age" => DEFAULT_AGE,
        "gpa_score" => DEFAULT_GPA,
        "total_experience_years" => DEFAULT_EXPERIENCE_YEARS,
        "years_since_graduation" => profile
            .get("graduation_year")
            .and_then(FieldValue::as_number)
            .map(|year| f64::from(policy.reference_year) - year)
            .unwrap_or(DEFAULT_YEARS_SINCE_GRADUATION),
        _ => 0.0,
    }
}

/// Adds a default for every schema column missing from `profile`.
pub fn fill_defaults(profile: &mut ProfileInput, schema: &FeatureSchema, policy: DefaultPolicy) {
    for column in schema.columns() {
        if !profile.contains_key(column) {
            let value = default_value(column, profile, policy);
            profile.insert(column.clone(), FieldValue::Number(value));
        }
    }
}

/// Selects exactly the schema columns, in schema order, as numbers.
/// Extra keys are ignored; missing or non-numeric values become 0.
pub fn reorder(profile: &ProfileInput, schema: &FeatureSchema) -> Vec<f64> {
    schema
        .columns()
        .iter()
        .map(|column| {
            profile
                .get(column)
                .and_then(FieldValue::as_number)
                .unwrap_or(0.0)
        })
        .collect()
}
