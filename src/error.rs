//! Error taxonomy for the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::PipelineState;

/// Every failure the pipeline can surface, either from a method call or through an [`ErrorSink`](crate::pipeline::ErrorSink).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected at construction; the pipeline is never started.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// `start`/`abort`/`stop` called in a state that does not allow it.
    #[error("cannot {op} pipeline while {state}")]
    InvalidState {
        op: &'static str,
        state: PipelineState,
    },

    /// A directory entry could not be read. The node is skipped.
    #[error("cannot read {}: {source}", display_opt(.path))]
    Traversal {
        path: Option<PathBuf>,
        #[source]
        source: walkdir::Error,
    },

    /// The processor failed (or panicked) on one file. The worker moves on.
    #[error("failed to process {}: {message}", .path.display())]
    Processing { path: PathBuf, message: String },

    /// The configured root could not be opened. Fatal to the run.
    #[error("cannot access root {}: {source}", .root.display())]
    RootAccess {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Internal bookkeeping went wrong (barrier underflow, queue closed twice).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} thread panicked")]
    WorkerPanicked(String),
}

impl PipelineError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        PipelineError::Configuration {
            reason: reason.into(),
        }
    }

    /// Path of the item this error is about, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            PipelineError::Traversal { path, .. } => path.as_deref(),
            PipelineError::Processing { path, .. } => Some(path),
            PipelineError::RootAccess { root, .. } => Some(root),
            _ => None,
        }
    }
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown path>".to_string())
}
