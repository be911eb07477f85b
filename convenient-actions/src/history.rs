//! Persisted action history: the command line that last produced each file.
//!
//! Timestamps cannot see a changed compiler flag, so every produced item is
//! recorded together with the exact command line that wrote it. The history is
//! kept in memory during analysis and written once, atomically, after stale
//! outputs have been deleted.

use crate::error::{BuildError, BuildResult};
use crate::target::BuildTarget;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of a history inside its target directory.
pub const ACTION_HISTORY_FILE_NAME: &str = "ActionHistory.json";

/// Write data through a temp file, fsync it, then rename it into place.
fn atomic_write(path: &Path, data: &[u8]) -> BuildResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| BuildError::io(&temp_path, e))?;

    file.write_all(data).map_err(|e| BuildError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| BuildError::io(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| BuildError::io(path, e))?;

    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Produced-file key to last command line, for one target.
#[derive(Debug, Clone)]
pub struct ActionHistory {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl ActionHistory {
    /// Load the history stored at `path`.
    ///
    /// A missing file yields an empty history. An unreadable or corrupt file
    /// is logged and also yields an empty history; everything it covered is
    /// then rebuilt once.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(data) => match serde_json::from_slice(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt action history {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Unable to read action history {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        tracing::debug!("Loaded {} action history entries from {}", entries.len(), path.display());

        Self {
            path,
            entries,
            dirty: false,
        }
    }

    /// History that lives only in memory; [`ActionHistory::save`] is a no-op.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// History file of `target` below `intermediate_dir`.
    #[must_use]
    pub fn generate_path_for_target(intermediate_dir: &Path, target: &BuildTarget) -> PathBuf {
        intermediate_dir
            .join(target.platform.as_str())
            .join(&target.name)
            .join(target.configuration.as_str())
            .join(ACTION_HISTORY_FILE_NAME)
    }

    /// Whether the history is backed by a file.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    /// Location of the history file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Command line that last produced the item with key `key`.
    #[must_use]
    pub fn get_producing_command_line(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Record `command_line` for `key`. Returns `true` when the stored value
    /// changed, i.e. the item was produced by a different command last time.
    pub fn update_producing_command_line(&mut self, key: &str, command_line: &str) -> bool {
        if self.entries.get(key).is_some_and(|old| old == command_line) {
            return false;
        }
        let _ = self.entries.insert(key.to_string(), command_line.to_string());
        self.dirty = true;
        true
    }

    /// Number of recorded items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether there are unsaved changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the history if it changed since it was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::History`] if the file cannot be written.
    pub fn save(&mut self) -> BuildResult<()> {
        if !self.dirty || self.path.as_os_str().is_empty() {
            return Ok(());
        }

        let data = serde_json::to_vec_pretty(&self.entries)?;
        atomic_write(&self.path, &data).map_err(|e| BuildError::History {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        self.dirty = false;

        tracing::debug!("Saved {} action history entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}
