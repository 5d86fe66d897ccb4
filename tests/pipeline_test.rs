//! End-to-end pipeline integration tests

use std::fmt::Write as _;
use std::path::Path;

use potable::config::ExperimentSpec;
use potable::pipeline::run_experiment;
use potable::registry::ModelRegistry;
use potable::search::ParamValue;
use potable::tracking::storage::InMemoryBackend;
use potable::tracking::{ExperimentTracker, RunStatus};

/// Synthetic 100-row dataset: 9 feature columns with injected nulls plus a
/// binary label correlated with the feature level.
fn write_dataset(path: &Path) {
    let mut csv = String::from(
        "ph,Hardness,Solids,Chloramines,Sulfate,Conductivity,Organic_carbon,Trihalomethanes,Turbidity,Potability\n",
    );
    for row in 0..100 {
        let label = usize::from(row % 2 == 1);
        let base = if label == 1 { 50.0 } else { 10.0 };
        for col in 0..9 {
            // Every 7th cell of three columns is missing
            if col < 3 && (row + col) % 7 == 0 {
                csv.push(',');
                continue;
            }
            let value = base + col as f64 + ((row * 13 + col * 5) % 10) as f64 * 0.3;
            let _ = write!(csv, "{value:.3}");
            csv.push(',');
        }
        let _ = writeln!(csv, "{label}");
    }
    std::fs::write(path, csv).expect("write dataset");
}

fn scenario_spec(dir: &Path) -> ExperimentSpec {
    let data_path = dir.join("water_potability.csv");
    write_dataset(&data_path);

    let yaml = format!(
        "experiment: potability-it\n\
         data:\n  path: {}\n\
         split_seed: 69\n\
         search:\n  n_iter: 5\n  k_folds: 3\n  seed: 69\n\
         \x20 grid:\n    n_trees: [5, 10, 20]\n    max_depth: [null, 3, 5]\n\
         output:\n  tracking_dir: {}\n  model_path: {}\n  registry_path: {}\n  model_name: potability-it-rf\n",
        data_path.display(),
        dir.join("runs").display(),
        dir.join("model.json").display(),
        dir.join("registry.json").display(),
    );
    let config_path = dir.join("experiment.yaml");
    std::fs::write(&config_path, yaml).expect("write config");

    let spec = ExperimentSpec::from_yaml(&config_path).expect("load spec");
    assert_eq!(spec.grid().n_configurations(), 9);
    spec.validate().expect("valid spec");
    spec
}

#[test]
fn test_end_to_end_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = scenario_spec(dir.path());
    let config_path = dir.path().join("experiment.yaml");

    let mut tracker = ExperimentTracker::new("potability-it", InMemoryBackend::new());
    let mut registry = ModelRegistry::open(&spec.output.registry_path).expect("registry");

    let report = run_experiment(&spec, Some(&config_path), &mut tracker, &mut registry)
        .expect("pipeline");

    // Exactly one parent run and five child runs
    let runs = tracker.list_runs().expect("list");
    assert_eq!(runs.len(), 6);
    let parents: Vec<_> = runs.iter().filter(|r| r.parent_run_id.is_none()).collect();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].run_id, report.parent_run_id);

    let children = tracker
        .child_runs(&report.parent_run_id)
        .expect("children");
    assert_eq!(children.len(), 5);
    assert_eq!(report.child_run_ids.len(), 5);
    assert!(runs.iter().all(|r| r.status == RunStatus::Completed));

    // Every child carries the grid's parameter names and one CV score
    for child in &children {
        let mut keys: Vec<_> = child.params.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["max_depth", "n_trees"]);
        assert_eq!(child.metrics["mean_test_score"].len(), 1);
        let (score, _) = child.metrics["mean_test_score"][0];
        assert!(report.best_cv_score >= score);
    }

    // Four metrics, each inside the unit interval
    for (_, value) in report.metrics.named() {
        assert!((0.0..=1.0).contains(&value));
    }
    let parent = tracker.get_run(&report.parent_run_id).expect("parent");
    for name in ["accuracy", "precision", "recall", "f1"] {
        assert_eq!(parent.metrics[name].len(), 1);
    }

    // Parent references both partitions and the config artifact
    assert_eq!(parent.datasets.len(), 2);
    assert_eq!(parent.datasets[0].role, "train");
    assert_eq!(parent.datasets[1].role, "test");
    assert_eq!(parent.datasets[0].n_rows, 80);
    assert_eq!(parent.datasets[1].n_rows, 20);
    assert_eq!(parent.artifacts.len(), 1);
    assert!(parent.artifacts[0].digest.starts_with("sha256-"));

    // One persisted model file, loadable, plus a registry entry
    assert!(spec.output.model_path.exists());
    let model = potable::registry::load_model(&spec.output.model_path).expect("load model");
    assert!(model.is_fitted());

    assert_eq!(report.model_version, 1);
    let latest = registry.latest("potability-it-rf").expect("latest");
    assert_eq!(latest.version, 1);
    assert_eq!(latest.signature.inputs.len(), 9);
    assert_eq!(latest.signature.inputs[0].name, "ph");
    assert!(latest.metrics.contains_key("accuracy"));
}

#[test]
fn test_pipeline_deterministic_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = scenario_spec(dir.path());

    let mut first_tracker = ExperimentTracker::new("det-a", InMemoryBackend::new());
    let mut first_registry =
        ModelRegistry::open(dir.path().join("registry-a.json")).expect("registry");
    let first =
        run_experiment(&spec, None, &mut first_tracker, &mut first_registry).expect("pipeline");

    let mut second_tracker = ExperimentTracker::new("det-b", InMemoryBackend::new());
    let mut second_registry =
        ModelRegistry::open(dir.path().join("registry-b.json")).expect("registry");
    let second =
        run_experiment(&spec, None, &mut second_tracker, &mut second_registry).expect("pipeline");

    assert_eq!(first.best_params, second.best_params);
    assert_eq!(first.best_cv_score, second.best_cv_score);
    assert_eq!(first.metrics, second.metrics);
}

#[test]
fn test_pipeline_missing_dataset_fails_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut spec = scenario_spec(dir.path());
    spec.data.path = dir.path().join("absent.csv");

    let mut tracker = ExperimentTracker::new("missing", InMemoryBackend::new());
    let mut registry =
        ModelRegistry::open(dir.path().join("registry.json")).expect("registry");

    let err = run_experiment(&spec, None, &mut tracker, &mut registry).unwrap_err();
    assert!(matches!(err, potable::Error::Data(_)));

    // No dangling open runs after the failure
    assert!(tracker.active_run_ids().is_empty());
    assert!(tracker.list_runs().expect("list").is_empty());
}

#[test]
fn test_pipeline_unknown_grid_parameter_marks_runs_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut spec = scenario_spec(dir.path());
    spec.search
        .grid
        .insert("learning_rate".to_string(), vec![ParamValue::Float(0.1)]);

    let mut tracker = ExperimentTracker::new("bad-grid", InMemoryBackend::new());
    let mut registry =
        ModelRegistry::open(dir.path().join("registry.json")).expect("registry");

    let err = run_experiment(&spec, None, &mut tracker, &mut registry).unwrap_err();
    assert!(matches!(err, potable::Error::Search(_)));

    // The parent run had opened; it must be closed as failed, not dangling
    assert!(tracker.active_run_ids().is_empty());
    let runs = tracker.list_runs().expect("list");
    assert!(!runs.is_empty());
    assert!(runs.iter().all(|r| r.status == RunStatus::Failed));
}
