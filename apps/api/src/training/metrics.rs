//! Held-out evaluation: exact-match accuracy plus a per-class report.

use serde::{Deserialize, Serialize};

pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    hits as f64 / truth.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
}

impl ClassificationReport {
    /// Builds the report for classes `0..labels.len()`. Classes without
    /// support in `truth` still get a row; undefined ratios are 0.
    pub fn compute(truth: &[usize], predicted: &[usize], labels: &[String]) -> Self {
        let k = labels.len();
        let mut tp = vec![0usize; k];
        let mut predicted_count = vec![0usize; k];
        let mut support = vec![0usize; k];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < k {
                support[t] += 1;
            }
            if p < k {
                predicted_count[p] += 1;
            }
            if t == p && t < k {
                tp[t] += 1;
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let classes: Vec<ClassMetrics> = (0..k)
            .map(|c| {
                let precision = ratio(tp[c], predicted_count[c]);
                let recall = ratio(tp[c], support[c]);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: labels[c].clone(),
                    precision,
                    recall,
                    f1,
                    support: support[c],
                }
            })
            .collect();

        let n = k.max(1) as f64;
        let macro_avg = AveragedMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
        };

        let weighted_avg = AveragedMetrics {
            precision: support_weighted(&classes, |c| c.precision),
            recall: support_weighted(&classes, |c| c.recall),
            f1: support_weighted(&classes, |c| c.f1),
        };

        Self {
            accuracy: accuracy(truth, predicted),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

fn support_weighted<F>(classes: &[ClassMetrics], metric: F) -> f64
where
    F: Fn(&ClassMetrics) -> f64,
{
    let total: usize = classes.iter().map(|c| c.support).sum();
    if total == 0 {
        return 0.0;
    }
    classes
        .iter()
        .map(|c| metric(c) * c.support as f64)
        .sum::<f64>()
        / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 2, 2], &[0, 1, 1, 2]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_report_per_class_values() {
        let truth = [0, 0, 1, 1, 2, 2];
        let pred = [0, 1, 1, 1, 2, 0];
        let report = ClassificationReport::compute(&truth, &pred, &labels());

        let a = &report.classes[0];
        assert_eq!(a.support, 2);
        assert!((a.precision - 0.5).abs() < 1e-12);
        assert!((a.recall - 0.5).abs() < 1e-12);

        let b = &report.classes[1];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.recall, 1.0);
        assert!((b.f1 - 0.8).abs() < 1e-12);

        assert!((report.accuracy - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_class_without_support_reports_zero() {
        let report = ClassificationReport::compute(&[0, 0], &[0, 0], &labels());
        assert_eq!(report.classes[2].support, 0);
        assert_eq!(report.classes[2].f1, 0.0);
        assert_eq!(report.weighted_avg.f1, 1.0);
        assert!((report.macro_avg.f1 - 1.0 / 3.0).abs() < 1e-12);
    }
}
