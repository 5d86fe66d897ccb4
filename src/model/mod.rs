//! Classifier implementations
//!
//! Carries the estimator stack for the experiment: a CART decision tree and
//! the bagging random forest built on top of it. Both are deterministic
//! given a seed and serializable with serde so a fitted model can be
//! persisted and reloaded.
//!
//! The [`Classifier`] trait is the seam the search orchestrator evaluates
//! against; tests substitute stub estimators through it.

mod forest;
mod tree;

pub use forest::RandomForestClassifier;
pub use tree::DecisionTreeClassifier;

use ndarray::Array2;

/// Errors from estimator fitting and prediction
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model is not fitted")]
    NotFitted,

    #[error("expected {expected} features, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature matrix has {x} rows but label vector has {y}")]
    LengthMismatch { x: usize, y: usize },

    #[error("labels must be 0 or 1, got {0}")]
    InvalidLabel(usize),
}

/// Result alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Binary classifier over a dense feature matrix
pub trait Classifier {
    /// Fit on a feature matrix and 0/1 label vector
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()>;

    /// Predict a 0/1 label per row
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>>;
}

pub(crate) fn validate_training_input(x: &Array2<f64>, y: &[usize]) -> Result<()> {
    if x.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(ModelError::LengthMismatch {
            x: x.nrows(),
            y: y.len(),
        });
    }
    for &label in y {
        if label > 1 {
            return Err(ModelError::InvalidLabel(label));
        }
    }
    Ok(())
}
