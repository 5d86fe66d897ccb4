//! Potable CLI
//!
//! Experiment entry point for the potable library.
//!
//! # Usage
//!
//! ```bash
//! # Run an experiment from config
//! potable run experiment.yaml
//!
//! # Run with overrides
//! potable run experiment.yaml --data water.csv --n-iter 10 --seed 7
//!
//! # Validate config
//! potable validate experiment.yaml
//!
//! # Show resolved config
//! potable info experiment.yaml
//! ```

use clap::Parser;
use potable::cli::{run_command, Cli};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "off" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
