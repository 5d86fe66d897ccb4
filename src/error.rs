//! Crate-level error type
//!
//! Each module defines its own `thiserror` enum; this type aggregates them
//! for the pipeline and CLI so callers get distinguishable failure kinds
//! (missing input, schema mismatch, tracking-store failure, serialization
//! failure) out of one `Result` alias.

use thiserror::Error;

/// Top-level error for experiment runs
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("data error: {0}")]
    Data(#[from] crate::data::DataError),

    #[error("model error: {0}")]
    Model(#[from] crate::model::ModelError),

    #[error("search error: {0}")]
    Search(#[from] crate::search::SearchError),

    #[error("evaluation error: {0}")]
    Eval(#[from] crate::eval::EvalError),

    #[error("tracking error: {0}")]
    Tracking(#[from] crate::tracking::TrackingError),

    #[error("registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
