//! Random forest classifier
//!
//! Bagging ensemble over [`DecisionTreeClassifier`]: each tree fits a
//! bootstrap sample and examines a sqrt-sized feature subset per split;
//! prediction is a majority vote. Fully deterministic for a given seed.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{validate_training_input, Classifier, DecisionTreeClassifier, ModelError, Result};

/// Random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_trees: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    seed: u64,
    trees: Vec<DecisionTreeClassifier>,
    n_features: usize,
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomForestClassifier {
    /// Create an unfitted forest with default settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    /// Number of trees in the ensemble
    #[must_use]
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees.max(1);
        self
    }

    /// Depth limit applied to every tree; `None` is unlimited
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Minimum samples a tree node needs before it may split
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Seed controlling bootstrap and feature subsampling
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of trees configured
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Configured depth limit
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Whether the forest has been fitted
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        validate_training_input(x, y)?;

        let n = x.nrows();
        self.n_features = x.ncols();
        let max_features = (self.n_features as f64).sqrt().ceil() as usize;
        let max_features = max_features.clamp(1, self.n_features);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_trees);

        for _ in 0..self.n_trees {
            let indices: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let mut tree_rng = StdRng::seed_from_u64(rng.random::<u64>());

            let mut tree = DecisionTreeClassifier::new()
                .with_max_depth(self.max_depth)
                .with_min_samples_split(self.min_samples_split)
                .with_max_features(Some(max_features));
            tree.fit_with_indices(x, y, &indices, &mut tree_rng)?;
            trees.push(tree);
        }

        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                got: x.ncols(),
            });
        }

        let mut votes = vec![[0usize; 2]; x.nrows()];
        for tree in &self.trees {
            for (row, class) in tree.predict(x)?.into_iter().enumerate() {
                votes[row][class] += 1;
            }
        }

        Ok(votes
            .into_iter()
            .map(|v| if v[1] > v[0] { 1 } else { 0 })
            .collect())
    }
}
