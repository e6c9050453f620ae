//! Crate-level error type
//!
//! Module-specific errors (`OverrideError`, `ResolveError`, `EvalError`,
//! `TrackingError`) stay close to the code that raises them; this enum
//! aggregates them for callers that drive a whole run.

use thiserror::Error;

use crate::config::overrides::OverrideError;
use crate::eval::EvalError;
use crate::resolve::ResolveError;
use crate::tracking::TrackingError;

/// Top-level error for orchestration operations
#[derive(Debug, Error)]
pub enum Error {
    /// An override path failed to apply against the configuration tree
    #[error(transparent)]
    Override(#[from] OverrideError),

    /// A configuration node could not be resolved into a runtime object
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Evaluator registry construction or dispatch failed
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// Experiment tracking failed
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// Filesystem failure outside the modules above (checkpoints, outputs)
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
