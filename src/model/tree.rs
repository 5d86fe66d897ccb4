//! CART decision tree for binary classification
//!
//! Splits on Gini impurity with midpoint thresholds. Depth, node size, and
//! per-split feature subsampling are configurable; the forest drives the
//! subsampling to decorrelate its trees.

use std::cmp::Ordering;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{validate_training_input, Classifier, ModelError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: Option<usize>,
    seed: u64,
    root: Option<Node>,
    n_features: usize,
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeClassifier {
    /// Create an unfitted tree with default settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            seed: 0,
            root: None,
            n_features: 0,
        }
    }

    /// Limit tree depth; `None` grows until purity or node-size limits
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Minimum samples a node needs before it may split
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split.max(2);
        self
    }

    /// Number of candidate features examined per split
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Seed for feature subsampling
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Whether the tree has been fitted
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub(crate) fn fit_with_indices(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Result<()> {
        validate_training_input(x, y)?;
        if indices.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        self.n_features = x.ncols();
        self.root = Some(self.build(x, y, indices, 0, rng));
        Ok(())
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        let counts = class_counts(y, indices);
        let majority = if counts[1] > counts[0] { 1 } else { 0 };

        let depth_reached = self.max_depth.is_some_and(|limit| depth >= limit);
        if depth_reached
            || indices.len() < self.min_samples_split
            || counts[0] == 0
            || counts[1] == 0
        {
            return Node::Leaf { class: majority };
        }

        let Some((feature, threshold)) = self.best_split(x, y, indices, counts, rng) else {
            return Node::Leaf { class: majority };
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, feature]] <= threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return Node::Leaf { class: majority };
        }

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build(x, y, &left_idx, depth + 1, rng)),
            right: Box::new(self.build(x, y, &right_idx, depth + 1, rng)),
        }
    }

    /// Scan candidate features for the split with the lowest weighted Gini
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        counts: [usize; 2],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let features = self.candidate_features(x.ncols(), rng);
        let parent_impurity = gini(counts);
        let n = indices.len() as f64;

        let mut best: Option<(usize, f64, f64)> = None;
        let mut pairs: Vec<(f64, usize)> = Vec::with_capacity(indices.len());

        for feature in features {
            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (x[[i, feature]], y[i])));
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

            let mut left = [0usize; 2];
            for k in 0..pairs.len() - 1 {
                left[pairs[k].1] += 1;
                if pairs[k].0 == pairs[k + 1].0 {
                    continue;
                }

                let right = [counts[0] - left[0], counts[1] - left[1]];
                let n_left = (left[0] + left[1]) as f64;
                let n_right = n - n_left;
                let weighted = (n_left * gini(left) + n_right * gini(right)) / n;
                if weighted + 1e-12 >= parent_impurity {
                    continue;
                }

                let threshold = (pairs[k].0 + pairs[k + 1].0) / 2.0;
                if best.map_or(true, |(_, _, score)| weighted < score) {
                    best = Some((feature, threshold, weighted));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn candidate_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..n_features).collect();
        match self.max_features {
            Some(m) if m < n_features => {
                features.shuffle(rng);
                features.truncate(m);
                features
            }
            _ => features,
        }
    }
}

impl Classifier for DecisionTreeClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.fit_with_indices(x, y, &indices, &mut rng)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        if x.ncols() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                got: x.ncols(),
            });
        }

        let mut out = Vec::with_capacity(x.nrows());
        for row in 0..x.nrows() {
            let mut node = root;
            loop {
                match node {
                    Node::Leaf { class } => {
                        out.push(*class);
                        break;
                    }
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        node = if x[[row, *feature]] <= *threshold {
                            left
                        } else {
                            right
                        };
                    }
                }
            }
        }
        Ok(out)
    }
}

fn class_counts(y: &[usize], indices: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in indices {
        counts[y[i]] += 1;
    }
    counts
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [1.0, 0.9],
            [0.9, 1.1],
            [1.2, 1.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_fit_predict_separable() {
        let (x, y) = separable();
        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).expect("fit");
        assert_eq!(tree.predict(&x).expect("predict"), y);
    }

    #[test]
    fn test_unfitted_predict_errors() {
        let (x, _) = separable();
        let tree = DecisionTreeClassifier::new();
        assert!(matches!(
            tree.predict(&x).unwrap_err(),
            ModelError::NotFitted
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let (x, y) = separable();
        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).expect("fit");
        let wrong = array![[0.0, 1.0, 2.0]];
        assert!(matches!(
            tree.predict(&wrong).unwrap_err(),
            ModelError::ShapeMismatch { expected: 2, got: 3 }
        ));
    }

    #[test]
    fn test_max_depth_zero_is_majority_vote() {
        let (x, _) = separable();
        let y = vec![1, 1, 1, 1, 0, 0];
        let mut tree = DecisionTreeClassifier::new().with_max_depth(Some(0));
        tree.fit(&x, &y).expect("fit");
        assert_eq!(tree.predict(&x).expect("predict"), vec![1; 6]);
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let (x, _) = separable();
        let mut tree = DecisionTreeClassifier::new();
        let err = tree.fit(&x, &[0, 1]).unwrap_err();
        assert!(matches!(err, ModelError::LengthMismatch { x: 6, y: 2 }));
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let (x, _) = separable();
        let mut tree = DecisionTreeClassifier::new();
        let err = tree.fit(&x, &[0, 1, 2, 0, 1, 0]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidLabel(2)));
    }

    #[test]
    fn test_constant_feature_yields_leaf() {
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = vec![0, 1, 0, 0];
        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).expect("fit");
        assert_eq!(tree.predict(&x).expect("predict"), vec![0; 4]);
    }

    #[test]
    fn test_serde_roundtrip_preserves_predictions() {
        let (x, y) = separable();
        let mut tree = DecisionTreeClassifier::new().with_max_depth(Some(4));
        tree.fit(&x, &y).expect("fit");

        let json = serde_json::to_string(&tree).expect("serialize");
        let restored: DecisionTreeClassifier = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(
            tree.predict(&x).expect("predict"),
            restored.predict(&x).expect("predict")
        );
    }
}
