//! CLI module for potable
//!
//! Command definitions and handlers for the `potable` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ExperimentSpec;
use crate::pipeline::run_experiment;
use crate::registry::ModelRegistry;
use crate::tracking::storage::JsonFileBackend;
use crate::tracking::ExperimentTracker;
use crate::Result;

/// Reproducible water-potability classification experiments
#[derive(Debug, Parser)]
#[command(name = "potable", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress progress output
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the experiment described by a YAML config
    Run {
        /// Path to the experiment config
        config: PathBuf,

        /// Override the dataset path
        #[arg(long)]
        data: Option<PathBuf>,

        /// Override the number of sampled configurations
        #[arg(long)]
        n_iter: Option<usize>,

        /// Override the sampling and fold seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Parse and validate a config without running it
    Validate {
        /// Path to the experiment config
        config: PathBuf,
    },

    /// Show the resolved experiment settings
    Info {
        /// Path to the experiment config
        config: PathBuf,
    },
}

/// Dispatch a parsed CLI invocation
pub fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            config,
            data,
            n_iter,
            seed,
        } => {
            let mut spec = ExperimentSpec::from_yaml(&config)?;
            if let Some(data) = data {
                spec.data.path = data;
            }
            if let Some(n_iter) = n_iter {
                spec.search.n_iter = n_iter;
            }
            if let Some(seed) = seed {
                spec.search.seed = seed;
                spec.split_seed = seed;
            }
            spec.validate()?;

            let backend = JsonFileBackend::new(&spec.output.tracking_dir);
            let mut tracker = ExperimentTracker::new(spec.experiment.clone(), backend);
            let mut registry = ModelRegistry::open(&spec.output.registry_path)?;

            let report = run_experiment(&spec, Some(&config), &mut tracker, &mut registry)?;

            println!("Accuracy:  {:.4}", report.metrics.accuracy);
            println!("Precision: {:.4}", report.metrics.precision);
            println!("Recall:    {:.4}", report.metrics.recall);
            println!("F1-score:  {:.4}", report.metrics.f1);
            Ok(())
        }
        Command::Validate { config } => {
            let spec = ExperimentSpec::from_yaml(&config)?;
            spec.validate()?;
            println!("OK: {}", config.display());
            Ok(())
        }
        Command::Info { config } => {
            let spec = ExperimentSpec::from_yaml(&config)?;
            spec.validate()?;

            println!("Experiment:    {}", spec.experiment);
            println!("Dataset:       {}", spec.data.path.display());
            println!("Label column:  {}", spec.data.label);
            println!("Test fraction: {}", spec.data.test_fraction);
            println!("Split seed:    {}", spec.split_seed);
            println!(
                "Search:        n_iter={} k_folds={} seed={}",
                spec.search.n_iter, spec.search.k_folds, spec.search.seed
            );
            println!("Grid size:     {}", spec.grid().n_configurations());
            println!("Tracking dir:  {}", spec.output.tracking_dir.display());
            println!("Model path:    {}", spec.output.model_path.display());
            println!("Registry:      {}", spec.output.registry_path.display());
            println!("Model name:    {}", spec.output.model_name);
            Ok(())
        }
    }
}
