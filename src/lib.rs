//! # potable
//!
//! Reproducible water-potability classification experiments.
//!
//! The crate chains one linear pipeline: load a tabular CSV dataset, split
//! it into train/test partitions, impute missing values per partition,
//! random-search a hyperparameter grid with k-fold cross-validation, record
//! every trial as a nested run in a local tracking store, evaluate the
//! winning forest on the held-out partition, and persist it both as a local
//! file and as a versioned registry entry with an inferred signature.
//!
//! # Example
//!
//! ```no_run
//! use potable::config::ExperimentSpec;
//! use potable::pipeline::run_experiment;
//! use potable::registry::ModelRegistry;
//! use potable::tracking::storage::JsonFileBackend;
//! use potable::tracking::ExperimentTracker;
//!
//! # fn main() -> potable::Result<()> {
//! let spec = ExperimentSpec::from_yaml("experiment.yaml")?;
//! spec.validate()?;
//!
//! let backend = JsonFileBackend::new(&spec.output.tracking_dir);
//! let mut tracker = ExperimentTracker::new(spec.experiment.clone(), backend);
//! let mut registry = ModelRegistry::open(&spec.output.registry_path)?;
//!
//! let report = run_experiment(&spec, None, &mut tracker, &mut registry)?;
//! println!("accuracy {:.4}", report.metrics.accuracy);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod eval;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod search;
pub mod tracking;

mod error;

pub use error::{Error, Result};

pub use config::ExperimentSpec;
pub use data::Table;
pub use eval::BinaryMetrics;
pub use model::{Classifier, RandomForestClassifier};
pub use pipeline::{run_experiment, ExperimentReport};
pub use registry::{ModelRegistry, ModelSignature};
pub use search::{ParamGrid, ParamValue, RandomSearch};
pub use tracking::{ExperimentTracker, RunStatus};
