//! Error types for job controllers.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::relay::RelayError;
use crate::resource::ResolveError;
use crate::trigger::TriggerError;

/// Errors raised by a job controller.
///
/// None of these stop the controller: a failing tick is logged and retried on
/// the next interval. Only job deletion ends a controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The dataset format has no sample file writer.
    #[error("Unsupported sample file format '{format}'")]
    UnsupportedFormat { format: String },

    /// Trained and deployed artifacts use different formats.
    #[error("Trained model format '{trained}' is inconsistent with deploy model format '{deployed}'")]
    ModelFormatMismatch { trained: String, deployed: String },

    /// The deploy trigger needs exactly a (new, old) pair of eval results.
    #[error("Expected {expected} evaluation results, got {actual}")]
    EvalResultCount { expected: usize, actual: usize },

    /// The eval worker reported failure; the job stays in Eval.
    #[error("Eval worker failed for version {version}")]
    EvalWorkerFailed { version: u64 },

    /// A trigger rule could not be parsed or evaluated.
    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// File system operation failed.
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// Upstream relay failed.
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// A referenced dataset or model never became visible.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

impl ControllerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ControllerError::Io {
            path: path.into(),
            source,
        }
    }
}
