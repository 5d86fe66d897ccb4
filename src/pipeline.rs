//! End-to-end experiment orchestration
//!
//! Chains the straight-line recipe: load and split the dataset, impute each
//! partition independently, random-search the grid with cross-validation,
//! record one child run per trial under a parent run, fit the winning
//! configuration, persist it to the local file and the registry, and log
//! the held-out metrics. The first error aborts the run; any still-open
//! runs are closed as `Failed` before it propagates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ExperimentSpec;
use crate::data::Table;
use crate::eval::{evaluate, BinaryMetrics};
use crate::model::{Classifier, RandomForestClassifier};
use crate::registry::{self, ModelRegistry, ModelSignature, ModelVersion};
use crate::search::{ParamMap, ParamValue, RandomSearch, SearchError};
use crate::tracking::storage::TrackingBackend;
use crate::tracking::{DatasetRef, ExperimentTracker, RunStatus};
use crate::Result;

/// Summary of a finished experiment
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    /// The parent run wrapping search and evaluation
    pub parent_run_id: String,
    /// One child run per sampled configuration, in sampling order
    pub child_run_ids: Vec<String>,
    /// The winning configuration
    pub best_params: ParamMap,
    /// Cross-validated mean score of the winning configuration
    pub best_cv_score: f64,
    /// Held-out metrics of the refitted winner
    pub metrics: BinaryMetrics,
    /// Where the serialized model was written
    pub model_path: PathBuf,
    /// Registered model version
    pub model_version: u32,
}

/// Run the full experiment described by `spec`
///
/// `spec_path`, when given, is stored as an artifact on the parent run so
/// the tracking store keeps a copy of the exact configuration that
/// produced it.
pub fn run_experiment<B: TrackingBackend>(
    spec: &ExperimentSpec,
    spec_path: Option<&Path>,
    tracker: &mut ExperimentTracker<B>,
    registry: &mut ModelRegistry,
) -> Result<ExperimentReport> {
    match run_inner(spec, spec_path, tracker, registry) {
        Ok(report) => Ok(report),
        Err(e) => {
            // Close any still-open runs before propagating
            let _ = tracker.end_open_runs(RunStatus::Failed);
            Err(e)
        }
    }
}

fn run_inner<B: TrackingBackend>(
    spec: &ExperimentSpec,
    spec_path: Option<&Path>,
    tracker: &mut ExperimentTracker<B>,
    registry: &mut ModelRegistry,
) -> Result<ExperimentReport> {
    info!(path = %spec.data.path.display(), "loading dataset");
    let table = Table::from_csv(&spec.data.path, &spec.data.label)?;

    let (mut train, mut test) = table.split(spec.data.test_fraction, spec.split_seed)?;
    // Each partition is imputed with its own column means
    train.fill_missing_with_mean()?;
    test.fill_missing_with_mean()?;

    let (x_train, y_train) = train.to_matrix()?;
    let (x_test, y_test) = test.to_matrix()?;
    info!(
        train_rows = train.n_rows(),
        test_rows = test.n_rows(),
        features = train.n_features(),
        "dataset prepared"
    );

    let dataset_name = spec
        .data
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string();

    let parent = tracker.start_run(Some("random-forest-tuning"))?;
    tracker.log_param(&parent, "n_iter", &spec.search.n_iter.to_string())?;
    tracker.log_param(&parent, "k_folds", &spec.search.k_folds.to_string())?;
    tracker.log_param(&parent, "seed", &spec.search.seed.to_string())?;
    tracker.log_dataset(&parent, dataset_ref(&dataset_name, "train", &train))?;
    tracker.log_dataset(&parent, dataset_ref(&dataset_name, "test", &test))?;

    info!(
        n_iter = spec.search.n_iter,
        k_folds = spec.search.k_folds,
        grid_size = spec.grid().n_configurations(),
        "starting hyperparameter search"
    );
    let search = RandomSearch::new(
        spec.grid(),
        spec.search.n_iter,
        spec.search.k_folds,
        spec.search.seed,
    );
    let seed = spec.search.seed;
    let outcome = search.run(&x_train, &y_train, |params| forest_from_params(params, seed))?;

    let mut child_run_ids = Vec::with_capacity(outcome.trials.len());
    for trial in &outcome.trials {
        let name = format!("combination-{}", trial.index + 1);
        let child = tracker.start_child_run(&parent, Some(&name))?;
        tracker.log_params(&child, &stringify_params(&trial.params))?;
        tracker.log_metric(&child, "mean_test_score", trial.mean_score, 0)?;
        tracker.end_run(&child, RunStatus::Completed)?;
        debug!(trial = trial.index, score = trial.mean_score, "trial recorded");
        child_run_ids.push(child);
    }

    info!(
        score = outcome.best.mean_score,
        params = %format_params(&outcome.best.params),
        "best configuration selected"
    );
    tracker.log_params(&parent, &stringify_params(&outcome.best.params))?;

    // Refit the winner on the full training partition
    let mut best_model = forest_from_params(&outcome.best.params, seed)?;
    best_model.fit(&x_train, &y_train)?;

    registry::save_model(&best_model, &spec.output.model_path)?;
    info!(path = %spec.output.model_path.display(), "model serialized");

    // Evaluate the reloaded model: one prediction pass feeds all metrics
    let reloaded = registry::load_model(&spec.output.model_path)?;
    let metrics = evaluate(&reloaded, &x_test, &y_test)?;
    for (name, value) in metrics.named() {
        tracker.log_metric(&parent, name, value, 0)?;
    }

    if let Some(path) = spec_path {
        tracker.log_artifact(&parent, path)?;
    }

    let signature_preds = reloaded.predict(&x_test)?;
    let signature = ModelSignature::infer(train.feature_names(), &signature_preds);
    let version = register_model(spec, registry, signature, &metrics)?;
    info!(
        name = %spec.output.model_name,
        version = version.version,
        "model registered"
    );

    tracker.end_run(&parent, RunStatus::Completed)?;

    Ok(ExperimentReport {
        parent_run_id: parent,
        child_run_ids,
        best_params: outcome.best.params,
        best_cv_score: outcome.best.mean_score,
        metrics,
        model_path: spec.output.model_path.clone(),
        model_version: version.version,
    })
}

/// Build a forest from a sampled configuration
///
/// Recognized parameters: `n_trees`, `max_depth`, `min_samples_split`.
pub fn forest_from_params(
    params: &ParamMap,
    seed: u64,
) -> std::result::Result<RandomForestClassifier, SearchError> {
    let mut forest = RandomForestClassifier::new().with_seed(seed);
    for (name, value) in params {
        match name.as_str() {
            "n_trees" => {
                forest = forest.with_n_trees(positive_int(name, value)?);
            }
            "max_depth" => {
                forest = forest.with_max_depth(match value {
                    ParamValue::Null => None,
                    other => Some(positive_int(name, other)?),
                });
            }
            "min_samples_split" => {
                forest = forest.with_min_samples_split(positive_int(name, value)?);
            }
            other => return Err(SearchError::UnknownParameter(other.to_string())),
        }
    }
    Ok(forest)
}

fn positive_int(name: &str, value: &ParamValue) -> std::result::Result<usize, SearchError> {
    value
        .as_int()
        .filter(|&v| v > 0)
        .map(|v| v as usize)
        .ok_or_else(|| SearchError::InvalidParameter(name.to_string(), value.to_string()))
}

fn stringify_params(params: &ParamMap) -> HashMap<String, String> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect()
}

fn format_params(params: &ParamMap) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn dataset_ref(name: &str, role: &str, partition: &Table) -> DatasetRef {
    DatasetRef {
        name: name.to_string(),
        role: role.to_string(),
        n_rows: partition.n_rows(),
        n_cols: partition.n_features(),
        columns: partition.feature_names().to_vec(),
    }
}

fn register_model(
    spec: &ExperimentSpec,
    registry: &mut ModelRegistry,
    signature: ModelSignature,
    metrics: &BinaryMetrics,
) -> Result<ModelVersion> {
    let metric_map: HashMap<String, f64> = metrics
        .named()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

    let version = registry.register(
        &spec.output.model_name,
        &spec.output.model_path.to_string_lossy(),
        signature,
        &metric_map,
    )?;
    Ok(version)
}
