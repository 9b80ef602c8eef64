//! Inference Engine: turns a loose client profile into a ranked prediction
//! against one immutable bundle snapshot.
//!
//! Pipeline: encode categoricals → fill schema defaults → reorder to the
//! schema → scale → class probabilities → top-k with derived fields.
//! Nothing here is random; the same bundle and input always give the same
//! record.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::ModelError;
use crate::features::profile::{ProfileInput, SKILL_PREFIX};
use crate::features::schema::{fill_defaults, reorder, DefaultPolicy};
use crate::lifecycle::bundle::ModelBundle;
use crate::prediction::catalog::{growth_outlook, required_skills};

pub const TOP_K: usize = 5;

pub const FALLBACK_SALARY_MIN: i64 = 40_000;
pub const FALLBACK_SALARY_MAX: i64 = 120_000;
pub const SALARY_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryBand {
    pub min: i64,
    pub max: i64,
    pub currency: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketDemand {
    #[serde(rename = "Very High")]
    VeryHigh,
    High,
    Medium,
    Low,
}

impl MarketDemand {
    /// Bucket for a confidence percentage in [0, 100].
    pub fn from_confidence(percent: f64) -> Self {
        if percent >= 80.0 {
            MarketDemand::VeryHigh
        } else if percent >= 70.0 {
            MarketDemand::High
        } else if percent >= 50.0 {
            MarketDemand::Medium
        } else {
            MarketDemand::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRole {
    pub rank: usize,
    pub job_role: String,
    /// Percentage, two decimals.
    pub confidence_score: f64,
    pub salary_range: SalaryBand,
    pub market_demand: MarketDemand,
    pub required_skills: Vec<String>,
    pub growth_outlook: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub top_prediction: String,
    pub confidence_score: f64,
    pub predictions: Vec<RankedRole>,
    pub missing_skills: Vec<String>,
    pub salary_range: SalaryBand,
    pub market_demand: MarketDemand,
    pub training_months: u32,
    pub training_required: String,
    pub model_version: String,
    pub model_accuracy: f64,
}

pub struct InferenceEngine {
    bundle: Arc<ModelBundle>,
    policy: DefaultPolicy,
}

impl InferenceEngine {
    pub fn new(bundle: Arc<ModelBundle>, policy: DefaultPolicy) -> Self {
        Self { bundle, policy }
    }

    /// Steps 1–3: the unscaled feature vector in schema order.
    pub fn feature_vector(&self, input: &ProfileInput) -> Vec<f64> {
        let mut profile = self.bundle.encoders().encode_profile(input);
        fill_defaults(&mut profile, self.bundle.schema(), self.policy);
        reorder(&profile, self.bundle.schema())
    }

    /// Full per-class probability vector (0..1), indexed by label-encoder class.
    pub fn class_probabilities(&self, input: &ProfileInput) -> Result<Vec<f64>, ModelError> {
        let raw = self.feature_vector(input);
        let scaled = self.bundle.scaler().transform_row(&raw)?;
        self.bundle.classifier().predict_proba_row(&scaled)
    }

    pub fn predict(&self, input: &ProfileInput) -> Result<PredictionRecord, ModelError> {
        let probabilities = self.class_probabilities(input)?;

        let mut predictions = Vec::with_capacity(TOP_K);
        let mut top_percent = 0.0;
        for (rank, class) in rank_classes(&probabilities, TOP_K).into_iter().enumerate() {
            let job_role = self
                .bundle
                .label_encoder()
                .inverse(class)
                .ok_or_else(|| {
                    ModelError::Artifact(format!("classifier produced unknown class {class}"))
                })?
                .to_string();
            let percent = probabilities[class] * 100.0;
            if rank == 0 {
                top_percent = percent;
            }
            predictions.push(RankedRole {
                rank: rank + 1,
                confidence_score: round2(percent),
                salary_range: self.salary_band(&job_role),
                market_demand: MarketDemand::from_confidence(percent),
                required_skills: required_skills(&job_role)
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                growth_outlook: growth_outlook(&job_role).to_string(),
                job_role,
            });
        }

        let top = predictions.first().cloned().ok_or_else(|| {
            ModelError::Artifact("bundle has no job roles".to_string())
        })?;
        let missing = missing_skills(&top.required_skills, input);
        let months = training_months(missing.len());

        Ok(PredictionRecord {
            top_prediction: top.job_role,
            confidence_score: top.confidence_score,
            salary_range: top.salary_range,
            market_demand: MarketDemand::from_confidence(top_percent),
            predictions,
            missing_skills: missing,
            training_months: months,
            training_required: format!("Estimated {months} months of focused training"),
            model_version: self.bundle.version().to_string(),
            model_accuracy: self.bundle.accuracy(),
        })
    }

    fn salary_band(&self, role: &str) -> SalaryBand {
        match self.bundle.salary_for(role) {
            Some(range) => SalaryBand {
                min: range.salary_min_usd as i64,
                max: range.salary_max_usd as i64,
                currency: SALARY_CURRENCY,
            },
            None => SalaryBand {
                min: FALLBACK_SALARY_MIN,
                max: FALLBACK_SALARY_MAX,
                currency: SALARY_CURRENCY,
            },
        }
    }
}

/// Indices of the `k` most probable classes, highest first. Equal
/// probabilities keep class order.
pub fn rank_classes(probabilities: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(Ordering::Equal)
    });
    order.truncate(k);
    order
}

/// Required skills with no matching positive `skill_<name>` field in the input.
/// Matching ignores case and treats `_` as a space.
pub fn missing_skills(required: &[String], input: &ProfileInput) -> Vec<String> {
    let held: Vec<String> = input
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(SKILL_PREFIX)?;
            let level = value.as_number()?;
            (level > 0.0).then(|| normalize_skill(name))
        })
        .collect();
    required
        .iter()
        .filter(|skill| !held.contains(&normalize_skill(skill)))
        .cloned()
        .collect()
}

fn normalize_skill(name: &str) -> String {
    name.replace('_', " ").trim().to_lowercase()
}

/// 0 missing → 0 months, 1–2 → 1, 3–4 → 3, 5+ → 6.
pub fn training_months(missing: usize) -> u32 {
    match missing {
        0 => 0,
        1..=2 => 1,
        3..=4 => 3,
        _ => 6,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::profile::FieldValue;
    use crate::lifecycle::bundle::test_support::tiny_bundle;
    use crate::prediction::catalog::GENERIC_SKILLS;

    const POLICY: DefaultPolicy = DefaultPolicy {
        reference_year: 2024,
    };

    fn engine() -> InferenceEngine {
        InferenceEngine::new(Arc::new(tiny_bundle("engine")), POLICY)
    }

    fn profile(fields: &[(&str, FieldValue)]) -> ProfileInput {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_input_yields_ranked_predictions() {
        let record = engine().predict(&ProfileInput::new()).unwrap();
        // three classes in the bundle, so fewer than five are surfaced
        assert_eq!(record.predictions.len(), 3);
        assert_eq!(record.top_prediction, record.predictions[0].job_role);
        for (i, p) in record.predictions.iter().enumerate() {
            assert_eq!(p.rank, i + 1);
        }
        for pair in record.predictions.windows(2) {
            assert!(pair[0].confidence_score >= pair[1].confidence_score);
        }
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let e = engine();
        for input in [
            ProfileInput::new(),
            profile(&[("skill_python", FieldValue::Number(9.0))]),
            profile(&[("highest_degree", FieldValue::Text("Master".to_string()))]),
        ] {
            let p = e.class_probabilities(&input).unwrap();
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unseen_category_encodes_to_zero() {
        let e = engine();
        let phd_unseen = profile(&[("highest_degree", FieldValue::Text("Diploma".to_string()))]);
        let bachelor = profile(&[("highest_degree", FieldValue::Text("Bachelor".to_string()))]);
        // "Bachelor" is code 0 in the tiny bundle
        assert_eq!(e.feature_vector(&phd_unseen), e.feature_vector(&bachelor));
        let p = e.class_probabilities(&phd_unseen).unwrap();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(e.predict(&phd_unseen).is_ok());
    }

    #[test]
    fn test_input_order_is_irrelevant() {
        let e = engine();
        let a: ProfileInput = serde_json::from_str(
            r#"{"skill_python": 7, "highest_degree": "PhD", "extra": "x"}"#,
        )
        .unwrap();
        let b: ProfileInput = serde_json::from_str(
            r#"{"extra": "x", "highest_degree": "PhD", "skill_python": 7}"#,
        )
        .unwrap();
        let ra = serde_json::to_vec(&e.predict(&a).unwrap()).unwrap();
        let rb = serde_json::to_vec(&e.predict(&b).unwrap()).unwrap();
        assert_eq!(ra, rb);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let e = engine();
        let input = profile(&[("skill_python", FieldValue::Number(5.5))]);
        assert_eq!(e.predict(&input).unwrap(), e.predict(&input).unwrap());
    }

    #[test]
    fn test_no_skills_means_all_required_skills_missing() {
        let record = engine().predict(&ProfileInput::new()).unwrap();
        assert_eq!(
            record.missing_skills,
            required_skills(&record.top_prediction)
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_missing_skills_matching() {
        let required: Vec<String> = ["Python", "Machine Learning", "SQL", "Statistics"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let input = profile(&[
            ("skill_python", FieldValue::Number(8.0)),
            ("skill_machine_learning", FieldValue::Number(3.0)),
            ("skill_sql", FieldValue::Number(0.0)),
            ("python_years", FieldValue::Number(4.0)),
        ]);
        assert_eq!(missing_skills(&required, &input), vec!["SQL", "Statistics"]);
    }

    #[test]
    fn test_training_months_steps() {
        assert_eq!(training_months(0), 0);
        assert_eq!(training_months(1), 1);
        assert_eq!(training_months(2), 1);
        assert_eq!(training_months(3), 3);
        assert_eq!(training_months(4), 3);
        assert_eq!(training_months(6), 6);
        assert!(training_months(0) < training_months(2));
        assert!(training_months(2) <= training_months(4));
        assert!(training_months(4) <= training_months(6));
    }

    #[test]
    fn test_market_demand_thresholds() {
        assert_eq!(MarketDemand::from_confidence(80.0), MarketDemand::VeryHigh);
        assert_eq!(MarketDemand::from_confidence(79.99), MarketDemand::High);
        assert_eq!(MarketDemand::from_confidence(50.0), MarketDemand::Medium);
        assert_eq!(MarketDemand::from_confidence(49.9), MarketDemand::Low);
        assert_eq!(
            serde_json::to_string(&MarketDemand::VeryHigh).unwrap(),
            r#""Very High""#
        );
    }

    #[test]
    fn test_rank_classes_ties_keep_class_order() {
        assert_eq!(rank_classes(&[0.2, 0.4, 0.2, 0.2], 3), vec![1, 0, 2]);
        assert_eq!(rank_classes(&[0.5, 0.5], 5), vec![0, 1]);
    }

    #[test]
    fn test_salary_fallback_for_unknown_role() {
        let e = engine();
        assert_eq!(e.salary_band("Data Scientist").min, 80_000);
        let band = e.salary_band("Data Analyst");
        assert_eq!((band.min, band.max), (FALLBACK_SALARY_MIN, FALLBACK_SALARY_MAX));
        assert_eq!(band.currency, "USD");
    }

    #[test]
    fn test_generic_skills_for_unlisted_role() {
        assert_eq!(required_skills("Job_Role_1"), GENERIC_SKILLS);
    }
}
