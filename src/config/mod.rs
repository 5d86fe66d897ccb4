//! Experiment configuration
//!
//! YAML-declared experiment spec: dataset location, split settings, search
//! budget and grid, and output sinks. Defaults reproduce the reference
//! water-potability experiment so a minimal config only needs the data
//! path.
//!
//! ```yaml
//! experiment: water-potability
//! data:
//!   path: water_potability.csv
//! search:
//!   n_iter: 50
//!   k_folds: 5
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::search::{ParamGrid, ParamValue};

/// Errors from configuration loading and validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Dataset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSpec {
    /// Path to the CSV dataset
    pub path: PathBuf,
    /// Name of the binary label column
    #[serde(default = "default_label")]
    pub label: String,
    /// Fraction of rows held out for testing
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpec {
    /// Number of configurations to sample
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    /// Cross-validation folds
    #[serde(default = "default_k_folds")]
    pub k_folds: usize,
    /// Seed for sampling and fold assignment
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Hyperparameter grid: name to candidate values
    #[serde(default = "default_grid")]
    pub grid: BTreeMap<String, Vec<ParamValue>>,
}

impl Default for SearchSpec {
    fn default() -> Self {
        Self {
            n_iter: default_n_iter(),
            k_folds: default_k_folds(),
            seed: default_seed(),
            grid: default_grid(),
        }
    }
}

/// Output sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Directory for the tracking store
    #[serde(default = "default_tracking_dir")]
    pub tracking_dir: PathBuf,
    /// Path of the serialized model file
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Path of the model registry file
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    /// Name the model registers under
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            tracking_dir: default_tracking_dir(),
            model_path: default_model_path(),
            registry_path: default_registry_path(),
            model_name: default_model_name(),
        }
    }
}

/// Full experiment specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSpec {
    /// Experiment name in the tracking store
    #[serde(default = "default_experiment")]
    pub experiment: String,
    /// Dataset settings
    pub data: DataSpec,
    /// Seed for the train/test split
    #[serde(default = "default_seed")]
    pub split_seed: u64,
    /// Search settings
    #[serde(default)]
    pub search: SearchSpec,
    /// Output sinks
    #[serde(default)]
    pub output: OutputSpec,
}

impl ExperimentSpec {
    /// Load and parse a YAML spec file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let spec: ExperimentSpec = serde_yaml::from_str(&content)?;
        Ok(spec)
    }

    /// Check the spec is runnable
    pub fn validate(&self) -> Result<()> {
        if !(self.data.test_fraction > 0.0 && self.data.test_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "data.test_fraction must be in (0, 1), got {}",
                self.data.test_fraction
            )));
        }
        if self.search.n_iter == 0 {
            return Err(ConfigError::Invalid(
                "search.n_iter must be at least 1".to_string(),
            ));
        }
        if self.search.k_folds < 2 {
            return Err(ConfigError::Invalid(format!(
                "search.k_folds must be at least 2, got {}",
                self.search.k_folds
            )));
        }
        if self.search.grid.is_empty() {
            return Err(ConfigError::Invalid(
                "search.grid must name at least one parameter".to_string(),
            ));
        }
        for (name, values) in &self.search.grid {
            if values.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "search.grid.{name} has no candidate values"
                )));
            }
        }
        Ok(())
    }

    /// The search grid as a [`ParamGrid`]
    #[must_use]
    pub fn grid(&self) -> ParamGrid {
        ParamGrid::from_map(self.search.grid.clone())
    }
}

fn default_experiment() -> String {
    "water-potability".to_string()
}

fn default_label() -> String {
    crate::data::DEFAULT_LABEL.to_string()
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    69
}

fn default_n_iter() -> usize {
    50
}

fn default_k_folds() -> usize {
    5
}

/// Reference grid: tree counts and depth candidates of the original study
fn default_grid() -> BTreeMap<String, Vec<ParamValue>> {
    let mut grid = BTreeMap::new();
    grid.insert(
        "n_trees".to_string(),
        [100, 200, 300, 400, 1000].map(ParamValue::Int).to_vec(),
    );
    grid.insert(
        "max_depth".to_string(),
        vec![
            ParamValue::Null,
            ParamValue::Int(4),
            ParamValue::Int(5),
            ParamValue::Int(6),
            ParamValue::Int(10),
        ],
    );
    grid
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from("runs")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model.json")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("registry.json")
}

fn default_model_name() -> String {
    "water-potability-rf".to_string()
}
