//! Build configuration shared by the planner and the executors.

use crate::error::{BuildError, BuildResult};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Knobs that influence staleness analysis, cleanup and execution.
///
/// Every field has a default, so a configuration file only needs to list the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfiguration {
    /// Treat an action as outdated when the command line that produced its
    /// items differs from the current one.
    pub use_action_history: bool,

    /// Incremental linking: import libraries, export files and PDBs are not
    /// always touched by a link, so they are ignored when computing the
    /// oldest produced item, and stale PDBs are kept.
    pub use_incremental_linking: bool,

    /// Do not propagate staleness through import libraries.
    pub ignore_outdated_import_libraries: bool,

    /// Delete every existing produced item of an outdated action before
    /// execution, not only the ones that must be deleted.
    pub delete_all_outdated_produced_items: bool,

    /// Tolerance, in milliseconds, before a prerequisite counts as newer than
    /// the oldest produced item. Absorbs network-copy clock skew.
    pub timestamp_slop_ms: u64,

    /// Number of propagation passes used for dependent counts.
    pub dependent_count_depth: usize,

    /// Maximum number of actions the local executor runs concurrently.
    pub max_parallel_actions: usize,

    /// Root directory for per-target action history files.
    pub intermediate_dir: PathBuf,

    /// Retry policy for deleting files.
    pub delete_retry: RetryPolicy,

    /// Retry policy for remote host calls.
    pub remote_retry: RetryPolicy,
}

/// Default slop between a prerequisite and the oldest produced item.
pub const DEFAULT_TIMESTAMP_SLOP_MS: u64 = 1000;

/// Default number of dependent-count propagation passes.
pub const DEFAULT_DEPENDENT_COUNT_DEPTH: usize = 5;

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            use_action_history: true,
            use_incremental_linking: false,
            ignore_outdated_import_libraries: false,
            delete_all_outdated_produced_items: false,
            timestamp_slop_ms: DEFAULT_TIMESTAMP_SLOP_MS,
            dependent_count_depth: DEFAULT_DEPENDENT_COUNT_DEPTH,
            max_parallel_actions: num_cpus::get(),
            intermediate_dir: PathBuf::from("Intermediate"),
            delete_retry: RetryPolicy::file_delete(),
            remote_retry: RetryPolicy::remote_command(),
        }
    }
}

impl BuildConfiguration {
    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> BuildResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let config = serde_json::from_str(&content)?;
        tracing::debug!("Loaded build configuration from {}", path.display());
        Ok(config)
    }

    /// Slop as a signed time delta for timestamp comparisons.
    #[must_use]
    pub fn timestamp_slop(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::milliseconds(i64::try_from(self.timestamp_slop_ms).unwrap_or(i64::MAX))
    }
}
