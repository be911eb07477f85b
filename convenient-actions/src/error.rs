//! Error types for action graph planning and execution.

use crate::action::ActionId;
use std::path::PathBuf;

/// Errors raised while linking, planning or executing an action graph.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The action graph contains one or more cycles.
    ///
    /// `description` lists every offending action's command, arguments,
    /// prerequisites and produced items.
    #[error("Action graph contains cycle!\n\n{description}")]
    CycleDetected {
        /// Actions that could not be resolved to an acyclic order
        actions: Vec<ActionId>,
        /// Human readable dump of the offending actions
        description: String,
    },

    /// An action claimed success but did not produce one of its items.
    #[error("Failed to produce item: {}", .0.display())]
    MissingOutput(PathBuf),

    /// A filesystem operation failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path the operation was applied to
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// An action history file could not be read or written.
    #[error("Action history {}: {message}", path.display())]
    History {
        /// History file path
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// The remote build host reported an error.
    #[error("Remote host error: {0}")]
    Remote(String),

    /// The action manifest is malformed.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// An executor failed in a way that is not a plain action failure.
    #[error("Executor error: {0}")]
    Executor(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuildError {
    /// Wrap an IO error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for action graph operations.
pub type BuildResult<T> = Result<T, BuildError>;
