//! Integration tests for the tracking store

use potable::tracking::storage::{JsonFileBackend, TrackingBackend};
use potable::tracking::{DatasetRef, ExperimentTracker, RunStatus, TrackingError};

#[test]
fn test_full_run_tree_lifecycle_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runs_dir = dir.path().join("runs");

    let mut tracker =
        ExperimentTracker::new("lifecycle-test", JsonFileBackend::new(&runs_dir));
    tracker.add_tag("stage", "integration");

    let parent = tracker.start_run(Some("random-forest-tuning")).expect("start");
    tracker.log_param(&parent, "n_iter", "5").expect("param");
    tracker
        .log_dataset(
            &parent,
            DatasetRef {
                name: "water_potability".to_string(),
                role: "train".to_string(),
                n_rows: 80,
                n_cols: 9,
                columns: (0..9).map(|i| format!("col{i}")).collect(),
            },
        )
        .expect("dataset");

    for i in 0..3 {
        let child = tracker
            .start_child_run(&parent, Some(&format!("combination-{}", i + 1)))
            .expect("child");
        tracker.log_param(&child, "n_trees", "100").expect("param");
        tracker
            .log_metric(&child, "mean_test_score", 0.6 + i as f64 * 0.01, 0)
            .expect("metric");
        tracker.end_run(&child, RunStatus::Completed).expect("end");
    }

    tracker.log_metric(&parent, "accuracy", 0.68, 0).expect("metric");
    tracker.end_run(&parent, RunStatus::Completed).expect("end");

    // Everything must be reloadable through a fresh backend
    let backend = JsonFileBackend::new(&runs_dir);
    let runs = backend.list_runs().expect("list");
    assert_eq!(runs.len(), 4);

    let reloaded_parent = backend.load_run(&parent).expect("load");
    assert_eq!(reloaded_parent.status, RunStatus::Completed);
    assert_eq!(reloaded_parent.datasets.len(), 1);
    assert_eq!(reloaded_parent.tags.get("stage").map(String::as_str), Some("integration"));
    assert!(reloaded_parent.end_time_ms >= reloaded_parent.start_time_ms);

    let children: Vec<_> = runs
        .iter()
        .filter(|r| r.parent_run_id.as_deref() == Some(parent.as_str()))
        .collect();
    assert_eq!(children.len(), 3);
    for child in children {
        assert_eq!(child.experiment_name, "lifecycle-test");
        assert_eq!(child.metrics["mean_test_score"].len(), 1);
        // Child metrics never bleed onto the parent
        assert!(!reloaded_parent.metrics.contains_key("mean_test_score"));
    }
}

#[test]
fn test_nesting_interval_containment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut tracker = ExperimentTracker::new(
        "nesting-test",
        JsonFileBackend::new(dir.path().join("runs")),
    );

    let parent = tracker.start_run(None).expect("start");
    let child = tracker.start_child_run(&parent, None).expect("child");

    // Parent cannot close over an open child
    assert!(matches!(
        tracker.end_run(&parent, RunStatus::Completed).unwrap_err(),
        TrackingError::OpenChildren(_)
    ));

    tracker.end_run(&child, RunStatus::Completed).expect("end child");
    tracker.end_run(&parent, RunStatus::Completed).expect("end parent");

    // A closed parent cannot take new children
    assert!(matches!(
        tracker.start_child_run(&parent, None).unwrap_err(),
        TrackingError::ParentNotActive(_)
    ));
}

#[test]
fn test_artifact_copy_and_digest_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = dir.path().join("experiment.yaml");
    std::fs::write(&artifact, b"experiment: artifact-test\n").expect("write");

    let runs_dir = dir.path().join("runs");
    let mut tracker =
        ExperimentTracker::new("artifact-test", JsonFileBackend::new(&runs_dir));

    let run_id = tracker.start_run(None).expect("start");
    let digest = tracker.log_artifact(&run_id, &artifact).expect("artifact");
    tracker.end_run(&run_id, RunStatus::Completed).expect("end");

    let stored = runs_dir
        .join("artifacts")
        .join(&run_id)
        .join("experiment.yaml");
    assert_eq!(
        std::fs::read(stored).expect("read"),
        b"experiment: artifact-test\n"
    );

    let run = JsonFileBackend::new(&runs_dir).load_run(&run_id).expect("load");
    assert_eq!(run.artifacts.len(), 1);
    assert_eq!(run.artifacts[0].digest, digest);
}

#[test]
fn test_failure_cleanup_closes_whole_tree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut tracker = ExperimentTracker::new(
        "cleanup-test",
        JsonFileBackend::new(dir.path().join("runs")),
    );

    let parent = tracker.start_run(None).expect("start");
    let _child_a = tracker.start_child_run(&parent, None).expect("child");
    let _child_b = tracker.start_child_run(&parent, None).expect("child");

    tracker.end_open_runs(RunStatus::Failed).expect("cleanup");

    assert!(tracker.active_run_ids().is_empty());
    let runs = tracker.list_runs().expect("list");
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|r| r.status == RunStatus::Failed));
}
