//! Random hyperparameter search with k-fold cross-validation
//!
//! A [`ParamGrid`] holds discrete candidate values per hyperparameter.
//! [`RandomSearch`] samples configurations from the grid's Cartesian
//! product without replacement, scores each by mean validation accuracy
//! over k folds of the training partition, and ranks the trials. Recording
//! trials is the tracker's job; this module has no logging side effects so
//! it stays testable in isolation.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::model::{Classifier, ModelError};

/// Errors from search configuration and execution
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("parameter grid is empty")]
    EmptyGrid,

    #[error("grid parameter '{0}' has no candidate values")]
    EmptyCandidates(String),

    #[error("k_folds must be between 2 and the number of samples (k={k}, n={n})")]
    InvalidFolds { k: usize, n: usize },

    #[error("n_iter must be at least 1")]
    ZeroIterations,

    #[error("unknown search parameter '{0}'")]
    UnknownParameter(String),

    #[error("parameter '{0}' has incompatible value '{1}'")]
    InvalidParameter(String, String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result alias for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// A single hyperparameter candidate value
///
/// `Null` expresses "unset" candidates such as an unlimited tree depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Get as integer (floats truncate)
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as float (integers widen)
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Whether this is the `Null` candidate
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "none"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One sampled configuration: parameter name to chosen value
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Discrete hyperparameter grid
///
/// Parameters are kept in a `BTreeMap` so enumeration order, and with it
/// seeded sampling, is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    /// Create an empty grid
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with its candidate values
    pub fn add(&mut self, name: &str, values: Vec<ParamValue>) {
        self.params.insert(name.to_string(), values);
    }

    /// Build from a pre-assembled map
    #[must_use]
    pub fn from_map(params: BTreeMap<String, Vec<ParamValue>>) -> Self {
        Self { params }
    }

    /// Parameter names in enumeration order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.params.keys()
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the grid has no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Size of the Cartesian product
    #[must_use]
    pub fn n_configurations(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    /// Check the grid is usable for sampling
    pub fn validate(&self) -> Result<()> {
        if self.params.is_empty() {
            return Err(SearchError::EmptyGrid);
        }
        for (name, values) in &self.params {
            if values.is_empty() {
                return Err(SearchError::EmptyCandidates(name.clone()));
            }
        }
        Ok(())
    }

    /// Enumerate the full Cartesian product in deterministic key order
    #[must_use]
    pub fn enumerate(&self) -> Vec<ParamMap> {
        let entries: Vec<(&String, &Vec<ParamValue>)> = self.params.iter().collect();
        Self::cartesian(&entries)
    }

    fn cartesian(entries: &[(&String, &Vec<ParamValue>)]) -> Vec<ParamMap> {
        let Some(((name, values), rest)) = entries.split_first() else {
            return vec![ParamMap::new()];
        };

        let rest_configs = Self::cartesian(rest);
        values
            .iter()
            .flat_map(|value| {
                rest_configs.iter().map(move |config| {
                    let mut config = config.clone();
                    config.insert((*name).clone(), value.clone());
                    config
                })
            })
            .collect()
    }
}

/// Sample configurations from the grid without replacement
///
/// The Cartesian product is enumerated in key order, then shuffled with a
/// seeded RNG; the first `min(n_iter, grid size)` configurations are
/// returned in sampled order.
pub fn sample_configurations(grid: &ParamGrid, n_iter: usize, seed: u64) -> Result<Vec<ParamMap>> {
    if n_iter == 0 {
        return Err(SearchError::ZeroIterations);
    }
    grid.validate()?;

    let mut configs = grid.enumerate();
    let mut rng = StdRng::seed_from_u64(seed);
    configs.shuffle(&mut rng);
    configs.truncate(n_iter);
    Ok(configs)
}

/// k-fold cross-validation index splitter
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    pub k: usize,
    pub seed: u64,
}

impl KFold {
    /// Produce `(train_indices, validation_indices)` per fold
    ///
    /// Indices are a seeded permutation of `0..n` cut into k chunks; the
    /// first `n % k` folds take one extra sample. Every index lands in
    /// exactly one validation fold.
    pub fn split(&self, n: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if self.k < 2 || self.k > n {
            return Err(SearchError::InvalidFolds { k: self.k, n });
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        let base = n / self.k;
        let remainder = n % self.k;

        let mut folds = Vec::with_capacity(self.k);
        let mut start = 0;
        for fold in 0..self.k {
            let size = base + usize::from(fold < remainder);
            let validation: Vec<usize> = order[start..start + size].to_vec();
            let train: Vec<usize> = order[..start]
                .iter()
                .chain(order[start + size..].iter())
                .copied()
                .collect();
            folds.push((train, validation));
            start += size;
        }
        Ok(folds)
    }
}

/// One sampled configuration with its cross-validated mean score
#[derive(Debug, Clone, Serialize)]
pub struct TrialResult {
    /// Position in sampling order (zero-based)
    pub index: usize,
    /// The sampled configuration
    pub params: ParamMap,
    /// Mean validation accuracy over the folds
    pub mean_score: f64,
}

/// Ranked outcome of a search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// All trials in sampling order
    pub trials: Vec<TrialResult>,
    /// The winning trial; ties break toward the earlier sampled one
    pub best: TrialResult,
}

/// Random search over a parameter grid with k-fold cross-validation
#[derive(Debug, Clone)]
pub struct RandomSearch {
    grid: ParamGrid,
    n_iter: usize,
    k_folds: usize,
    seed: u64,
}

impl RandomSearch {
    /// Configure a search
    #[must_use]
    pub fn new(grid: ParamGrid, n_iter: usize, k_folds: usize, seed: u64) -> Self {
        Self {
            grid,
            n_iter,
            k_folds,
            seed,
        }
    }

    /// Run the search on the training partition
    ///
    /// `factory` builds a fresh estimator from a configuration; it is
    /// called once per configuration per fold so no state leaks between
    /// fold evaluations.
    pub fn run<M, F>(&self, x: &Array2<f64>, y: &[usize], mut factory: F) -> Result<SearchOutcome>
    where
        M: Classifier,
        F: FnMut(&ParamMap) -> Result<M>,
    {
        let configs = sample_configurations(&self.grid, self.n_iter, self.seed)?;
        let folds = KFold {
            k: self.k_folds,
            seed: self.seed,
        }
        .split(x.nrows())?;

        let mut trials = Vec::with_capacity(configs.len());
        for (index, params) in configs.into_iter().enumerate() {
            let mut score_sum = 0.0;
            for (train_idx, val_idx) in &folds {
                let mut model = factory(&params)?;
                let (x_train, y_train) = select_rows(x, y, train_idx);
                let (x_val, y_val) = select_rows(x, y, val_idx);

                model.fit(&x_train, &y_train)?;
                let predictions = model.predict(&x_val)?;
                score_sum += fold_accuracy(&predictions, &y_val);
            }

            trials.push(TrialResult {
                index,
                params,
                mean_score: score_sum / folds.len() as f64,
            });
        }

        let best = best_trial(&trials);
        Ok(SearchOutcome { trials, best })
    }
}

/// First trial with the maximal mean score (stable under ties)
fn best_trial(trials: &[TrialResult]) -> TrialResult {
    let mut best = &trials[0];
    for trial in &trials[1..] {
        if trial.mean_score > best.mean_score {
            best = trial;
        }
    }
    best.clone()
}

fn select_rows(x: &Array2<f64>, y: &[usize], rows: &[usize]) -> (Array2<f64>, Vec<usize>) {
    let sub_x = Array2::from_shape_fn((rows.len(), x.ncols()), |(r, c)| x[[rows[r], c]]);
    let sub_y = rows.iter().map(|&r| y[r]).collect();
    (sub_x, sub_y)
}

fn fold_accuracy(predictions: &[usize], truth: &[usize]) -> f64 {
    let correct = predictions
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    correct as f64 / truth.len() as f64
}
