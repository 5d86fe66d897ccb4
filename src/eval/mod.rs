//! Binary classification evaluation
//!
//! Computes accuracy, precision, recall, and F1 from a single confusion
//! matrix so every metric is derived from the same prediction pass. The
//! positive class is label 1; empty denominators yield 0.0.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::model::{Classifier, ModelError};

/// Errors from evaluation
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("predictions and targets must have the same length ({pred} vs {truth})")]
    LengthMismatch { pred: usize, truth: usize },

    #[error("cannot evaluate on an empty partition")]
    EmptyInput,

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result alias for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Binary confusion matrix (positive class = 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryConfusion {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl BinaryConfusion {
    /// Count outcomes from prediction and ground-truth slices
    pub fn from_predictions(y_pred: &[usize], y_true: &[usize]) -> Result<Self> {
        if y_pred.len() != y_true.len() {
            return Err(EvalError::LengthMismatch {
                pred: y_pred.len(),
                truth: y_true.len(),
            });
        }
        if y_pred.is_empty() {
            return Err(EvalError::EmptyInput);
        }

        let mut cm = Self {
            true_positives: 0,
            false_positives: 0,
            true_negatives: 0,
            false_negatives: 0,
        };
        for (&pred, &truth) in y_pred.iter().zip(y_true.iter()) {
            match (pred == 1, truth == 1) {
                (true, true) => cm.true_positives += 1,
                (true, false) => cm.false_positives += 1,
                (false, false) => cm.true_negatives += 1,
                (false, true) => cm.false_negatives += 1,
            }
        }
        Ok(cm)
    }

    /// Total number of samples counted
    #[must_use]
    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

/// The four headline metrics of a binary classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl BinaryMetrics {
    /// Derive all four metrics from one confusion matrix
    #[must_use]
    pub fn from_confusion(cm: &BinaryConfusion) -> Self {
        let tp = cm.true_positives as f64;
        let fp = cm.false_positives as f64;
        let fn_ = cm.false_negatives as f64;
        let total = cm.total() as f64;

        let accuracy = (tp + cm.true_negatives as f64) / total;
        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy,
            precision,
            recall,
            f1,
        }
    }

    /// Metrics as `(name, value)` pairs in logging order
    #[must_use]
    pub fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1", self.f1),
        ]
    }
}

/// Evaluate a fitted classifier on a held-out partition
///
/// Predicts exactly once and derives every metric from that single output,
/// so repeated calls on the same model and partition are identical.
pub fn evaluate<M: Classifier>(
    model: &M,
    x_test: &Array2<f64>,
    y_test: &[usize],
) -> Result<BinaryMetrics> {
    let y_pred = model.predict(x_test)?;
    let cm = BinaryConfusion::from_predictions(&y_pred, y_test)?;
    Ok(BinaryMetrics::from_confusion(&cm))
}
