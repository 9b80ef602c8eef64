//! Random forest classifier.
//!
//! Bootstrap-sampled CART trees with weighted Gini impurity and a random
//! feature subset per node. Leaves keep the weighted class distribution of
//! their samples, and `predict_proba` averages those distributions across
//! trees, so every probability row sums to 1.

use ndarray::Array2;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Number of candidate features examined at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    All,
    Fixed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// `n_samples / (n_present_classes * class_count)`
    Balanced,
    Uniform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub class_weight: ClassWeight,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weight: ClassWeight::Balanced,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn features_per_split(&self, n_features: usize) -> usize {
        let k = match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

/// A fitted tree stored as a flat node arena; the root is node 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_distribution(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
    params: ForestParams,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fits a forest on `x` (rows = samples) against class indices `y`.
    /// `n_classes` fixes the width of the probability vector even when some
    /// classes are absent from `y`.
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        params: &ForestParams,
    ) -> Result<Self, ModelError> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(ModelError::InsufficientData(format!(
                "cannot fit forest on a {n_samples}x{n_features} matrix"
            )));
        }
        if y.len() != n_samples {
            return Err(ModelError::Schema(format!(
                "{} labels for {n_samples} samples",
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(ModelError::Schema(format!(
                "class index {bad} out of range for {n_classes} classes"
            )));
        }
        if params.n_estimators == 0 {
            return Err(ModelError::Schema(
                "n_estimators must be positive".to_string(),
            ));
        }

        let class_weights = class_weights(y, n_classes, params.class_weight);
        let max_features = params.features_per_split(n_features);

        let fitted: Vec<(DecisionTree, Vec<f64>)> = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(tree_idx as u64));
                let indices: Vec<usize> = if params.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let mut builder = TreeBuilder {
                    x,
                    y,
                    class_weights: &class_weights,
                    n_classes,
                    max_features,
                    params,
                    rng,
                    nodes: Vec::new(),
                    importances: vec![0.0; n_features],
                };
                builder.build(indices, 0);
                (
                    DecisionTree {
                        nodes: builder.nodes,
                    },
                    normalized(builder.importances),
                )
            })
            .collect();

        let mut feature_importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, importances) in fitted {
            for (total, imp) in feature_importances.iter_mut().zip(importances) {
                *total += imp;
            }
            trees.push(tree);
        }

        Ok(Self {
            trees,
            n_classes,
            n_features,
            params: params.clone(),
            feature_importances: normalized(feature_importances),
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean impurity decrease per feature, normalized to sum to 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn predict_proba_row(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::Schema(format!(
                "classifier expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, d) in proba.iter_mut().zip(tree.leaf_distribution(row)) {
                *p += d;
            }
        }
        Ok(normalized_or_uniform(proba))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        let rows = x
            .rows()
            .into_iter()
            .map(|row| self.predict_proba_row(&row.to_vec()))
            .collect::<Result<Vec<_>, _>>()?;
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((x.nrows(), self.n_classes), flat)
            .map_err(|e| ModelError::Schema(e.to_string()))
    }

    /// Most probable class per row; ties go to the lowest class index.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelError> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (idx, p) in row.iter().enumerate() {
                    if *p > row[best] {
                        best = idx;
                    }
                }
                best
            })
            .collect())
    }
}

fn class_weights(y: &[usize], n_classes: usize, mode: ClassWeight) -> Vec<f64> {
    match mode {
        ClassWeight::Uniform => vec![1.0; n_classes],
        ClassWeight::Balanced => {
            let mut counts = vec![0usize; n_classes];
            for &c in y {
                counts[c] += 1;
            }
            let present = counts.iter().filter(|&&c| c > 0).count().max(1) as f64;
            counts
                .iter()
                .map(|&count| {
                    if count == 0 {
                        0.0
                    } else {
                        y.len() as f64 / (present * count as f64)
                    }
                })
                .collect()
        }
    }
}

fn normalized(mut values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in &mut values {
            *v /= total;
        }
    }
    values
}

fn normalized_or_uniform(values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.into_iter().map(|v| v / total).collect()
    } else {
        let n = values.len().max(1) as f64;
        vec![1.0 / n; values.len()]
    }
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
    children_impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    class_weights: &'a [f64],
    n_classes: usize,
    max_features: usize,
    params: &'a ForestParams,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn class_counts(&self, indices: &[usize]) -> (Vec<f64>, f64) {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += self.class_weights[self.y[i]];
        }
        let total = counts.iter().sum();
        (counts, total)
    }

    fn push_leaf(&mut self, counts: Vec<f64>) -> usize {
        self.nodes.push(Node::Leaf {
            distribution: normalized_or_uniform(counts),
        });
        self.nodes.len() - 1
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let (counts, total) = self.class_counts(&indices);
        let n = indices.len();
        let pure = counts.iter().filter(|&&c| c > 0.0).count() <= 1;
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);

        if pure
            || depth_reached
            || n < self.params.min_samples_split.max(2)
            || n < 2 * self.params.min_samples_leaf.max(1)
        {
            return self.push_leaf(counts);
        }

        let parent_impurity = gini(&counts, total);
        let Some(best) = self.find_best_split(&indices, parent_impurity, total) else {
            return self.push_leaf(counts);
        };

        self.importances[best.feature] += total * parent_impurity - best.children_impurity;

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, best.feature]] <= best.threshold);

        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.build(left, depth + 1);
        let right = self.build(right, depth + 1);
        self.nodes[slot] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        slot
    }

    fn find_best_split(
        &mut self,
        indices: &[usize],
        parent_impurity: f64,
        total: f64,
    ) -> Option<BestSplit> {
        let n_features = self.x.ncols();
        let candidates = sample(&mut self.rng, n_features, self.max_features).into_vec();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = indices.len();

        let mut best: Option<BestSplit> = None;
        for feature in candidates {
            let mut sorted: Vec<(f64, usize)> = indices
                .iter()
                .map(|&i| (self.x[[i, feature]], self.y[i]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0.0; self.n_classes];
            let mut left_total = 0.0;
            let (mut right, _) = self.class_counts(indices);
            let mut right_total = total;

            for pos in 0..n - 1 {
                let (value, class) = sorted[pos];
                let w = self.class_weights[class];
                left[class] += w;
                left_total += w;
                right[class] -= w;
                right_total -= w;

                let left_n = pos + 1;
                if left_n < min_leaf || n - left_n < min_leaf {
                    continue;
                }
                let next = sorted[pos + 1].0;
                if next <= value {
                    continue;
                }

                let children = left_total * gini(&left, left_total)
                    + right_total * gini(&right, right_total);
                let gain = parent_impurity - children / total;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: value + (next - value) / 2.0,
                        gain,
                        children_impurity: children,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_params(n_estimators: usize) -> ForestParams {
        ForestParams {
            n_estimators,
            max_depth: Some(8),
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..ForestParams::default()
        }
    }

    fn separable() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [0.3, 0.3],
            [5.0, 5.0],
            [5.1, 5.2],
            [5.2, 5.1],
            [5.3, 5.3],
            [10.0, 0.0],
            [10.1, 0.2],
            [10.2, 0.1],
            [10.3, 0.3],
        ];
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];
        (x, y)
    }

    #[test]
    fn test_fit_and_predict_separable_classes() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 3, &small_params(25)).unwrap();
        assert_eq!(forest.n_trees(), 25);
        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 3, &small_params(10)).unwrap();
        let proba = forest.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let single = forest.predict_proba_row(&[2.5, 2.5]).unwrap();
        assert!((single.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_absent_class_gets_zero_probability() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 5, &small_params(5)).unwrap();
        let proba = forest.predict_proba_row(&[0.0, 0.0]).unwrap();
        assert_eq!(proba.len(), 5);
        assert_eq!(proba[3], 0.0);
        assert_eq!(proba[4], 0.0);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = separable();
        let a = RandomForest::fit(&x, &y, 3, &small_params(8)).unwrap();
        let b = RandomForest::fit(&x, &y, 3, &small_params(8)).unwrap();
        let probe = [4.0, 1.0];
        assert_eq!(
            a.predict_proba_row(&probe).unwrap(),
            b.predict_proba_row(&probe).unwrap()
        );
    }

    #[test]
    fn test_max_depth_is_respected() {
        let (x, y) = separable();
        let params = ForestParams {
            max_depth: Some(1),
            ..small_params(4)
        };
        let forest = RandomForest::fit(&x, &y, 3, &params).unwrap();
        assert!(forest.trees.iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn test_balanced_weights_upweight_rare_class() {
        let w = class_weights(&[0, 0, 0, 1], 3, ClassWeight::Balanced);
        // 4 / (2 * 3) and 4 / (2 * 1); absent class gets 0
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
        assert_eq!(w[2], 0.0);
    }

    #[test]
    fn test_feature_importances_favor_informative_feature() {
        let x = array![
            [0.0, 7.0],
            [0.0, 3.0],
            [0.0, 5.0],
            [1.0, 4.0],
            [1.0, 6.0],
            [1.0, 2.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        let params = ForestParams {
            max_features: MaxFeatures::All,
            bootstrap: false,
            ..small_params(3)
        };
        let forest = RandomForest::fit(&x, &y, 2, &params).unwrap();
        let imp = forest.feature_importances();
        assert!(imp[0] > imp[1]);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 3, &small_params(2)).unwrap();
        assert!(matches!(
            forest.predict_proba_row(&[1.0]),
            Err(ModelError::Schema(_))
        ));
    }

    #[test]
    fn test_label_out_of_range_rejected() {
        let (x, _) = separable();
        let y = vec![0; 11].into_iter().chain([7]).collect::<Vec<_>>();
        assert!(RandomForest::fit(&x, &y, 3, &small_params(2)).is_err());
    }
}
