//! Profile input: the flat field→value mapping clients submit, plus the derived
//! profile scores computed before inference.
//!
//! The derived scores mirror the columns present in the training data
//! (`education_score`, `tech_skill_score`, ...), so a bare client profile lines
//! up with what the classifier was fitted on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single scalar field in a user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

/// Flat, string-keyed profile. Key order carries no meaning.
pub type ProfileInput = BTreeMap<String, FieldValue>;

impl FieldValue {
    /// Numeric coercion. Booleans become 1/0, numeric text is parsed,
    /// anything else (including NaN/inf) is `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(x) => *x,
            FieldValue::Bool(b) => f64::from(u8::from(*b)),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            FieldValue::Null => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Category label used for encoder lookups. Renders numbers the same way
    /// the training dataset does, so `3` and `"3"` hit the same code.
    pub fn as_label(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(x) => Some(number_label(*x)),
            FieldValue::Bool(b) => Some(number_label(f64::from(u8::from(*b)))),
            FieldValue::Null => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        self.as_number().map(|n| n > 0.0).unwrap_or(false)
    }
}

/// Canonical text form of a numeric cell.
pub fn number_label(x: f64) -> String {
    x.to_string()
}

pub const SKILL_PREFIX: &str = "skill_";
pub const CERT_PREFIX: &str = "cert_";

/// Soft skills; every other `skill_*` field counts as technical.
pub const SOFT_SKILLS: &[&str] = &[
    "skill_communication",
    "skill_leadership",
    "skill_problem_solving",
    "skill_teamwork",
    "skill_project_management",
    "skill_english_proficiency",
    "skill_presentation_skills",
    "skill_negotiation_skills",
    "skill_time_management",
];

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Range checks on the fields that have a documented scale. Absent fields
/// are fine; present ones must be numeric and in range.
pub fn validate_profile(input: &ProfileInput, reference_year: i32) -> Result<(), String> {
    for (key, value) in input {
        if key.starts_with(SKILL_PREFIX) || key == "gpa_score" {
            check_range(key, value, 0.0, 10.0)?;
        }
    }
    if let Some(value) = input.get("total_experience_years") {
        check_range("total_experience_years", value, 0.0, 50.0)?;
    }
    if let Some(value) = input.get("graduation_year") {
        check_range("graduation_year", value, 1900.0, 2100.0)?;
        if value.as_number().unwrap_or(0.0) > f64::from(reference_year) {
            return Err("graduation_year cannot be in the future".to_string());
        }
    }
    Ok(())
}

fn check_range(key: &str, value: &FieldValue, min: f64, max: f64) -> Result<(), String> {
    if matches!(value, FieldValue::Null) {
        return Ok(());
    }
    match value.as_number() {
        Some(n) if (min..=max).contains(&n) => Ok(()),
        Some(n) => Err(format!("{key} must be between {min} and {max}, got {n}")),
        None => Err(format!("{key} must be numeric")),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Derived scores
// ────────────────────────────────────────────────────────────────────────────

/// Inserts the derived profile scores. Fields the caller already supplied are
/// left untouched.
pub fn derive_profile_scores(input: &mut ProfileInput, reference_year: i32) {
    let num = |input: &ProfileInput, key: &str| {
        input.get(key).and_then(FieldValue::as_number).unwrap_or(0.0)
    };
    let flag = |input: &ProfileInput, key: &str| {
        input.get(key).map(FieldValue::is_truthy).unwrap_or(false)
    };

    let mut derived: Vec<(&str, f64)> = Vec::new();

    if let Some(year) = input.get("graduation_year").and_then(FieldValue::as_number) {
        derived.push(("years_since_graduation", f64::from(reference_year) - year));
    }

    let mut education_score = num(input, "gpa_score") * 10.0;
    if num(input, "academic_awards") > 0.0 {
        education_score += 5.0;
    }

    let tech: Vec<f64> = input
        .iter()
        .filter(|(k, _)| k.starts_with(SKILL_PREFIX) && !SOFT_SKILLS.contains(&k.as_str()))
        .map(|(_, v)| v.as_number().unwrap_or(0.0))
        .collect();
    let tech_skill_score = if tech.is_empty() {
        0.0
    } else {
        tech.iter().sum::<f64>() / tech.len() as f64
    };

    let soft_skill_score =
        SOFT_SKILLS.iter().map(|k| num(input, k)).sum::<f64>() / SOFT_SKILLS.len() as f64;

    let cert_score = input
        .iter()
        .filter(|(k, v)| k.starts_with(CERT_PREFIX) && v.is_truthy())
        .count() as f64
        * 5.0;

    let mut experience_quality_score = (num(input, "total_experience_years") * 2.0).min(20.0);
    if flag(input, "has_managerial_exp") {
        experience_quality_score += 5.0;
    }
    if flag(input, "international_exp") {
        experience_quality_score += 5.0;
    }

    let overall_profile_score = education_score * 0.20
        + tech_skill_score * 0.25
        + soft_skill_score * 0.20
        + cert_score * 0.15
        + experience_quality_score * 0.20;

    derived.extend([
        ("education_score", education_score),
        ("tech_skill_score", tech_skill_score),
        ("soft_skill_score", soft_skill_score),
        ("premium_cert_score", cert_score),
        ("experience_quality_score", experience_quality_score),
        ("overall_profile_score", overall_profile_score),
    ]);

    for (key, value) in derived {
        input
            .entry(key.to_string())
            .or_insert(FieldValue::Number(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(fields: &[(&str, FieldValue)]) -> ProfileInput {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_field_value_deserializes_untagged() {
        let input: ProfileInput = serde_json::from_str(
            r#"{"age": 30, "cert_aws": true, "highest_degree": "PhD", "notes": null}"#,
        )
        .unwrap();
        assert_eq!(input["age"], FieldValue::Number(30.0));
        assert_eq!(input["cert_aws"], FieldValue::Bool(true));
        assert_eq!(input["highest_degree"], FieldValue::Text("PhD".to_string()));
        assert_eq!(input["notes"], FieldValue::Null);
    }

    #[test]
    fn test_as_number_coercion() {
        assert_eq!(FieldValue::Text(" 3.5 ".to_string()).as_number(), Some(3.5));
        assert_eq!(FieldValue::Text("Master".to_string()).as_number(), None);
        assert_eq!(FieldValue::Bool(true).as_number(), Some(1.0));
        assert_eq!(FieldValue::Number(f64::NAN).as_number(), None);
        assert_eq!(FieldValue::Null.as_number(), None);
    }

    #[test]
    fn test_as_label_matches_number_rendering() {
        assert_eq!(FieldValue::Number(3.0).as_label().unwrap(), "3");
        assert_eq!(FieldValue::Number(2.5).as_label().unwrap(), "2.5");
        assert_eq!(FieldValue::Bool(false).as_label().unwrap(), "0");
        assert!(FieldValue::Null.as_label().is_none());
    }

    #[test]
    fn test_validate_rejects_out_of_range_skill() {
        let input = profile(&[("skill_python", FieldValue::Number(11.0))]);
        let err = validate_profile(&input, 2024).unwrap_err();
        assert!(err.contains("skill_python"));
    }

    #[test]
    fn test_validate_rejects_future_graduation() {
        let input = profile(&[("graduation_year", FieldValue::Number(2030.0))]);
        assert!(validate_profile(&input, 2024).is_err());
    }

    #[test]
    fn test_validate_accepts_partial_profile() {
        let input = profile(&[
            ("gpa_score", FieldValue::Number(8.2)),
            ("highest_degree", FieldValue::Text("Master".to_string())),
        ]);
        assert!(validate_profile(&input, 2024).is_ok());
    }

    #[test]
    fn test_derived_scores() {
        let mut input = profile(&[
            ("graduation_year", FieldValue::Number(2020.0)),
            ("gpa_score", FieldValue::Number(8.0)),
            ("academic_awards", FieldValue::Number(1.0)),
            ("skill_python", FieldValue::Number(8.0)),
            ("skill_sql", FieldValue::Number(6.0)),
            ("skill_communication", FieldValue::Number(9.0)),
            ("cert_aws", FieldValue::Bool(true)),
            ("cert_azure", FieldValue::Bool(false)),
            ("total_experience_years", FieldValue::Number(4.0)),
            ("has_managerial_exp", FieldValue::Bool(true)),
        ]);
        derive_profile_scores(&mut input, 2024);

        let get = |k: &str| input[k].as_number().unwrap();
        assert_eq!(get("years_since_graduation"), 4.0);
        assert_eq!(get("education_score"), 85.0);
        assert_eq!(get("tech_skill_score"), 7.0);
        assert_eq!(get("soft_skill_score"), 1.0);
        assert_eq!(get("premium_cert_score"), 5.0);
        assert_eq!(get("experience_quality_score"), 13.0);
        // 0.2*85 + 0.25*7 + 0.2*1 + 0.15*5 + 0.2*13
        assert!((get("overall_profile_score") - 22.3).abs() < 1e-9);
    }

    #[test]
    fn test_derived_scores_keep_caller_values() {
        let mut input = profile(&[("education_score", FieldValue::Number(42.0))]);
        derive_profile_scores(&mut input, 2024);
        assert_eq!(input["education_score"], FieldValue::Number(42.0));
        assert!(!input.contains_key("years_since_graduation"));
    }
}
