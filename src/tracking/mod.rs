//! Experiment tracking with nested runs
//!
//! Records an experiment as a tree of runs: one parent run for the whole
//! search plus one child run per sampled configuration. Every logging call
//! takes the id of the run it targets; there is no ambient "current run".
//! Persistence goes through the pluggable
//! [`TrackingBackend`](storage::TrackingBackend) trait.
//!
//! # Example
//!
//! ```
//! use potable::tracking::{ExperimentTracker, RunStatus};
//! use potable::tracking::storage::InMemoryBackend;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let backend = InMemoryBackend::new();
//! let mut tracker = ExperimentTracker::new("water-potability", backend);
//!
//! let parent = tracker.start_run(Some("tuning"))?;
//! let child = tracker.start_child_run(&parent, Some("combination-1"))?;
//! tracker.log_param(&child, "n_trees", "100")?;
//! tracker.log_metric(&child, "mean_test_score", 0.64, 0)?;
//! tracker.end_run(&child, RunStatus::Completed)?;
//!
//! tracker.log_metric(&parent, "accuracy", 0.67, 0)?;
//! tracker.end_run(&parent, RunStatus::Completed)?;
//!
//! assert_eq!(tracker.list_runs()?.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod storage;


use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use storage::{TrackingBackend, TrackingStorageError};

/// Status of a tracking run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is actively recording
    Active,
    /// Run completed successfully
    Completed,
    /// Run failed
    Failed,
}

/// Reference to a dataset partition used by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Dataset name (usually the source file stem)
    pub name: String,
    /// Role in the experiment ("train" or "test")
    pub role: String,
    /// Number of rows in the partition
    pub n_rows: usize,
    /// Number of feature columns
    pub n_cols: usize,
    /// Ordered feature column names
    pub columns: Vec<String>,
}

/// A stored artifact with its content digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// File name of the artifact within the run
    pub name: String,
    /// `sha256-` prefixed content digest
    pub digest: String,
}

/// A single experiment run
///
/// Holds parameters, per-step metrics, dataset references, artifacts, and
/// tags. `parent_run_id` links child runs (one per search trial) to the
/// parent run that owns the whole experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for the run
    pub run_id: String,
    /// Optional human-readable name
    pub run_name: Option<String>,
    /// Parent experiment name
    pub experiment_name: String,
    /// Enclosing run, if this is a nested child
    pub parent_run_id: Option<String>,
    /// Current status
    pub status: RunStatus,
    /// Hyperparameters: key -> value (string-encoded)
    pub params: HashMap<String, String>,
    /// Metrics: key -> list of (value, step)
    pub metrics: HashMap<String, Vec<(f64, u64)>>,
    /// Dataset references
    pub datasets: Vec<DatasetRef>,
    /// Stored artifacts
    pub artifacts: Vec<ArtifactRef>,
    /// Tags: key -> value
    pub tags: HashMap<String, String>,
    /// Unix timestamp (ms) when the run started
    pub start_time_ms: Option<u64>,
    /// Unix timestamp (ms) when the run ended
    pub end_time_ms: Option<u64>,
}

impl Run {
    fn new(
        run_id: String,
        run_name: Option<String>,
        experiment_name: String,
        parent_run_id: Option<String>,
    ) -> Self {
        Self {
            run_id,
            run_name,
            experiment_name,
            parent_run_id,
            status: RunStatus::Active,
            params: HashMap::new(),
            metrics: HashMap::new(),
            datasets: Vec::new(),
            artifacts: Vec::new(),
            tags: HashMap::new(),
            start_time_ms: Some(now_ms()),
            end_time_ms: None,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Errors from experiment tracking operations
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Run is not active: {0}")]
    RunNotActive(String),

    #[error("Parent run is not active: {0}")]
    ParentNotActive(String),

    #[error("Run {0} still has active child runs")]
    OpenChildren(String),

    #[error("Artifact not readable: {0}")]
    ArtifactUnreadable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] TrackingStorageError),
}

/// Result alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Experiment tracker
///
/// Manages a tree of runs under a single experiment name. A child run's
/// lifetime is strictly contained within its parent's open interval:
/// children can only start under an active parent, and a parent cannot end
/// while any child is still active.
#[derive(Debug)]
pub struct ExperimentTracker<B: TrackingBackend> {
    experiment_name: String,
    tags: HashMap<String, String>,
    backend: B,
    /// Active runs held in memory for fast mutation
    active_runs: HashMap<String, Run>,
    next_run_id: u64,
}

impl<B: TrackingBackend> ExperimentTracker<B> {
    /// Create a new tracker for the given experiment name
    pub fn new(experiment_name: impl Into<String>, backend: B) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            tags: HashMap::new(),
            backend,
            active_runs: HashMap::new(),
            next_run_id: 1,
        }
    }

    /// Add an experiment-level tag, inherited by runs started afterwards
    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Get the experiment name
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Start a new top-level run, optionally with a human-readable name
    ///
    /// Returns the run ID.
    pub fn start_run(&mut self, run_name: Option<&str>) -> Result<String> {
        self.create_run(run_name, None)
    }

    /// Start a run nested under an active parent
    pub fn start_child_run(&mut self, parent_id: &str, run_name: Option<&str>) -> Result<String> {
        if !self.active_runs.contains_key(parent_id) {
            return Err(TrackingError::ParentNotActive(parent_id.to_string()));
        }
        self.create_run(run_name, Some(parent_id.to_string()))
    }

    fn create_run(&mut self, run_name: Option<&str>, parent: Option<String>) -> Result<String> {
        let run_id = format!("run-{}", self.next_run_id);
        self.next_run_id += 1;

        let mut run = Run::new(
            run_id.clone(),
            run_name.map(String::from),
            self.experiment_name.clone(),
            parent,
        );
        // Inherit experiment-level tags
        for (k, v) in &self.tags {
            run.tags.insert(k.clone(), v.clone());
        }

        self.active_runs.insert(run_id.clone(), run);
        Ok(run_id)
    }

    /// End a run with the given status, persisting it to the backend
    ///
    /// Fails with [`TrackingError::OpenChildren`] while any child run is
    /// still active, and with [`TrackingError::RunNotFound`] if the run was
    /// already ended. A failed child leaves its siblings and parent intact.
    pub fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        if !self.active_runs.contains_key(run_id) {
            return Err(TrackingError::RunNotFound(run_id.to_string()));
        }
        let has_open_children = self
            .active_runs
            .values()
            .any(|run| run.parent_run_id.as_deref() == Some(run_id));
        if has_open_children {
            return Err(TrackingError::OpenChildren(run_id.to_string()));
        }

        let mut run = self
            .active_runs
            .remove(run_id)
            .ok_or_else(|| TrackingError::RunNotFound(run_id.to_string()))?;
        run.status = status;
        run.end_time_ms = Some(now_ms());

        self.backend.save_run(&run)?;
        Ok(())
    }

    /// End every still-open run, children before parents
    ///
    /// Used when a failure unwinds the pipeline: each open run is closed
    /// exactly once with the given status.
    pub fn end_open_runs(&mut self, status: RunStatus) -> Result<()> {
        while !self.active_runs.is_empty() {
            let closable: Vec<String> = self
                .active_runs
                .values()
                .filter(|run| {
                    !self
                        .active_runs
                        .values()
                        .any(|other| other.parent_run_id.as_deref() == Some(run.run_id.as_str()))
                })
                .map(|run| run.run_id.clone())
                .collect();

            for run_id in closable {
                self.end_run(&run_id, status)?;
            }
        }
        Ok(())
    }

    /// IDs of runs that are currently open
    #[must_use]
    pub fn active_run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active_runs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Log a single parameter (hyperparameter)
    pub fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let run = self.active_run_mut(run_id)?;
        run.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Log multiple parameters at once
    pub fn log_params(&mut self, run_id: &str, params: &HashMap<String, String>) -> Result<()> {
        let run = self.active_run_mut(run_id)?;
        for (k, v) in params {
            run.params.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    /// Log a metric value at a given step
    pub fn log_metric(&mut self, run_id: &str, key: &str, value: f64, step: u64) -> Result<()> {
        let run = self.active_run_mut(run_id)?;
        run.metrics
            .entry(key.to_string())
            .or_default()
            .push((value, step));
        Ok(())
    }

    /// Attach a dataset reference to a run
    pub fn log_dataset(&mut self, run_id: &str, dataset: DatasetRef) -> Result<()> {
        let run = self.active_run_mut(run_id)?;
        run.datasets.push(dataset);
        Ok(())
    }

    /// Store a file as a run artifact
    ///
    /// The file's bytes are copied into the backend and recorded with a
    /// `sha256-` content digest. Returns the digest.
    pub fn log_artifact(&mut self, run_id: &str, path: &Path) -> Result<String> {
        if !self.active_runs.contains_key(run_id) {
            return Err(TrackingError::RunNotActive(run_id.to_string()));
        }

        let data = std::fs::read(path)
            .map_err(|e| TrackingError::ArtifactUnreadable(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("artifact")
            .to_string();
        let digest = format!("sha256-{:x}", Sha256::digest(&data));

        self.backend.store_artifact(run_id, &name, &data)?;

        let run = self.active_run_mut(run_id)?;
        run.artifacts.push(ArtifactRef {
            name,
            digest: digest.clone(),
        });
        Ok(digest)
    }

    fn active_run_mut(&mut self, run_id: &str) -> Result<&mut Run> {
        self.active_runs
            .get_mut(run_id)
            .ok_or_else(|| TrackingError::RunNotActive(run_id.to_string()))
    }

    /// Retrieve a run by ID
    ///
    /// Checks active (in-memory) runs first, then falls back to the backend.
    pub fn get_run(&self, run_id: &str) -> Result<Run> {
        if let Some(run) = self.active_runs.get(run_id) {
            return Ok(run.clone());
        }
        self.backend
            .load_run(run_id)
            .map_err(|e| TrackingError::RunNotFound(format!("{run_id}: {e}")))
    }

    /// List all runs (active + persisted)
    pub fn list_runs(&self) -> Result<Vec<Run>> {
        let mut runs: Vec<Run> = self.active_runs.values().cloned().collect();
        let persisted = self.backend.list_runs()?;
        // Avoid duplicates: only add persisted runs whose IDs are not active
        for r in persisted {
            if !self.active_runs.contains_key(&r.run_id) {
                runs.push(r);
            }
        }
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        Ok(runs)
    }

    /// All runs nested under the given parent
    pub fn child_runs(&self, parent_id: &str) -> Result<Vec<Run>> {
        Ok(self
            .list_runs()?
            .into_iter()
            .filter(|run| run.parent_run_id.as_deref() == Some(parent_id))
            .collect())
    }
}
