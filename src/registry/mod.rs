//! Model persistence and registry
//!
//! Two independent sinks for the winning model: a local serialized file
//! (`save_model`/`load_model`) and a versioned registry entry carrying the
//! inferred input/output signature plus evaluation metrics. The writes are
//! sequential with no atomicity between them; a failure in one does not
//! roll back the other.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::RandomForestClassifier;

/// Errors from model persistence and registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model not found in registry: {0}")]
    ModelNotFound(String),
}

/// Result alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Serialize a fitted model to a local JSON file
pub fn save_model(model: &RandomForestClassifier, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string(model)?;
    fs::write(path, json)?;
    Ok(())
}

/// Restore a model previously written by [`save_model`]
pub fn load_model(path: impl AsRef<Path>) -> Result<RandomForestClassifier> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// One column of a model signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: String,
}

/// Inferred input/output schema of a model
///
/// Used at serving time to validate that inference inputs match what the
/// model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    /// Ordered input feature columns
    pub inputs: Vec<ColumnSpec>,
    /// Output column
    pub output: ColumnSpec,
    /// Class labels observed in the inference output
    pub classes: Vec<usize>,
}

impl ModelSignature {
    /// Infer a signature from the feature schema and a prediction pass
    #[must_use]
    pub fn infer(feature_names: &[String], predictions: &[usize]) -> Self {
        let inputs = feature_names
            .iter()
            .map(|name| ColumnSpec {
                name: name.clone(),
                dtype: "float64".to_string(),
            })
            .collect();

        let mut classes: Vec<usize> = predictions.to_vec();
        classes.sort_unstable();
        classes.dedup();

        Self {
            inputs,
            output: ColumnSpec {
                name: "prediction".to_string(),
                dtype: "int64".to_string(),
            },
            classes,
        }
    }
}

/// Model version metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Model name
    pub name: String,
    /// Version number (monotonically increasing per name)
    pub version: u32,
    /// URI of the serialized model artifact
    pub artifact_uri: String,
    /// Inferred input/output signature
    pub signature: ModelSignature,
    /// Evaluation metrics attached at registration
    pub metrics: HashMap<String, f64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ModelVersion {
    fn new(name: &str, version: u32, artifact_uri: &str, signature: ModelSignature) -> Self {
        Self {
            name: name.to_string(),
            version,
            artifact_uri: artifact_uri.to_string(),
            signature,
            metrics: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach a metric
    #[must_use]
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }
}

/// JSON file-backed model registry
///
/// Keeps every registered version per model name; version numbers increase
/// monotonically. The whole registry is rewritten on each registration.
#[derive(Debug)]
pub struct ModelRegistry {
    path: PathBuf,
    models: HashMap<String, Vec<ModelVersion>>,
}

impl ModelRegistry {
    /// Open a registry file, loading existing entries if present
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let models = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        } else {
            HashMap::new()
        };
        Ok(Self { path, models })
    }

    /// Register a model version
    ///
    /// Assigns the next version number for `name`, persists the registry,
    /// and returns the new entry.
    pub fn register(
        &mut self,
        name: &str,
        artifact_uri: &str,
        signature: ModelSignature,
        metrics: &HashMap<String, f64>,
    ) -> Result<ModelVersion> {
        let versions = self.models.entry(name.to_string()).or_default();
        let next = versions.last().map_or(1, |v| v.version + 1);

        let mut entry = ModelVersion::new(name, next, artifact_uri, signature);
        entry.metrics = metrics.clone();
        versions.push(entry.clone());

        self.persist()?;
        Ok(entry)
    }

    /// Latest registered version of a model
    pub fn latest(&self, name: &str) -> Result<&ModelVersion> {
        self.models
            .get(name)
            .and_then(|versions| versions.last())
            .ok_or_else(|| RegistryError::ModelNotFound(name.to_string()))
    }

    /// All versions of a model, oldest first
    pub fn list_versions(&self, name: &str) -> Result<&[ModelVersion]> {
        self.models
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| RegistryError::ModelNotFound(name.to_string()))
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.models)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classifier, RandomForestClassifier};
    use ndarray::Array2;

    fn fitted_forest() -> (RandomForestClassifier, Array2<f64>, Vec<usize>) {
        let x = Array2::from_shape_fn((16, 3), |(r, c)| {
            if r < 8 {
                c as f64
            } else {
                9.0 + c as f64
            }
        });
        let y: Vec<usize> = (0..16).map(|r| usize::from(r >= 8)).collect();
        let mut forest = RandomForestClassifier::new().with_n_trees(4).with_seed(5);
        forest.fit(&x, &y).expect("fit");
        (forest, x, y)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.json");
        let (forest, x, _) = fitted_forest();

        save_model(&forest, &path).expect("save");
        let restored = load_model(&path).expect("load");

        assert_eq!(
            forest.predict(&x).expect("predict"),
            restored.predict(&x).expect("predict")
        );
    }

    #[test]
    fn test_load_missing_model() {
        let err = load_model("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, RegistryError::Io(_)));
    }

    #[test]
    fn test_signature_infer() {
        let names = vec!["ph".to_string(), "hardness".to_string()];
        let signature = ModelSignature::infer(&names, &[0, 1, 1, 0, 1]);

        assert_eq!(signature.inputs.len(), 2);
        assert_eq!(signature.inputs[0].name, "ph");
        assert_eq!(signature.inputs[0].dtype, "float64");
        assert_eq!(signature.output.dtype, "int64");
        assert_eq!(signature.classes, vec![0, 1]);
    }

    #[test]
    fn test_registry_versions_increase() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut registry = ModelRegistry::open(dir.path().join("registry.json")).expect("open");

        let signature = ModelSignature::infer(&["ph".to_string()], &[0, 1]);
        let metrics = HashMap::new();

        let v1 = registry
            .register("water-rf", "model.json", signature.clone(), &metrics)
            .expect("register");
        let v2 = registry
            .register("water-rf", "model.json", signature, &metrics)
            .expect("register");

        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(registry.latest("water-rf").expect("latest").version, 2);
        assert_eq!(registry.list_versions("water-rf").expect("list").len(), 2);
    }

    #[test]
    fn test_registry_persists_across_opens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.json");

        let signature = ModelSignature::infer(&["ph".to_string()], &[0, 1]);
        let mut metrics = HashMap::new();
        metrics.insert("accuracy".to_string(), 0.67);

        {
            let mut registry = ModelRegistry::open(&path).expect("open");
            registry
                .register("water-rf", "model.json", signature, &metrics)
                .expect("register");
        }

        let registry = ModelRegistry::open(&path).expect("reopen");
        let latest = registry.latest("water-rf").expect("latest");
        assert_eq!(latest.version, 1);
        assert_eq!(latest.metrics.get("accuracy"), Some(&0.67));
        assert_eq!(latest.signature.classes, vec![0, 1]);
    }

    #[test]
    fn test_registry_unknown_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ModelRegistry::open(dir.path().join("registry.json")).expect("open");
        assert!(matches!(
            registry.latest("ghost").unwrap_err(),
            RegistryError::ModelNotFound(_)
        ));
    }
}
