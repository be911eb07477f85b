//! File records and the path-keyed registry that guarantees one record per file.
//!
//! Every path is canonicalized to a key; all references to the same key share a
//! single [`FileId`], so producer links and cached metadata stay consistent
//! across actions. Metadata is only refreshed on request ([`FileTable::reset_all`]),
//! never behind the back of a running analysis.

use crate::action::ActionId;
use crate::error::{BuildError, BuildResult};
use crate::remote::{RemoteFileInfo, RemoteHost};
use crate::retry::{RetryPolicy, retry_sync};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Index of a file record inside a [`FileTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

impl FileId {
    /// Position of the record in its table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}

/// One on-disk (or remote) path plus its cached metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// Absolute, normalized path
    pub path: PathBuf,
    /// Whether the file lives on a remote build host
    pub is_remote: bool,
    /// Whether the file existed at the last refresh
    pub exists: bool,
    /// Whether the path is a directory
    pub is_directory: bool,
    /// Last modification time (UTC)
    pub last_write_time: Option<DateTime<Utc>>,
    /// Size in bytes, -1 when unknown
    pub length: i64,
    /// Weight used for sort tie-breaks
    pub relative_cost: i64,
    /// Action producing this file, set by graph linking
    pub producing_action: Option<ActionId>,
    /// Whether stale numbered hot-reload siblings should be swept
    pub needs_hot_reload_cleanup: bool,
}

impl FileItem {
    fn unknown(path: PathBuf, is_remote: bool) -> Self {
        Self {
            path,
            is_remote,
            exists: false,
            is_directory: false,
            last_write_time: None,
            length: -1,
            relative_cost: 0,
            producing_action: None,
            needs_hot_reload_cleanup: false,
        }
    }

    /// Re-stat a local file in place. A missing file is not an error.
    pub fn refresh_local(&mut self) {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => {
                self.exists = true;
                self.is_directory = metadata.is_dir();
                self.length = i64::try_from(metadata.len()).unwrap_or(i64::MAX);
                self.last_write_time = metadata.modified().ok().map(DateTime::<Utc>::from);
            }
            Err(_) => {
                self.exists = false;
                self.is_directory = false;
                self.length = -1;
                self.last_write_time = None;
            }
        }
    }

    fn apply_remote(&mut self, info: &RemoteFileInfo) {
        self.exists = info.exists;
        self.last_write_time = info.last_write_time;
        self.length = info.length;
    }

    fn mark_deleted(&mut self) {
        self.exists = false;
        self.length = -1;
        self.last_write_time = None;
    }

    /// Case-insensitive extension check, `ext` given without the dot.
    #[must_use]
    pub fn has_extension(&self, ext: &str) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// File name for log messages.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Registry of all file records of one build graph.
#[derive(Debug, Default, Clone)]
pub struct FileTable {
    items: Vec<FileItem>,
    by_key: HashMap<String, FileId>,
    pending_remote: Vec<FileId>,
}

impl FileTable {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared record for a local path, stat'ing it on first access.
    pub fn get_by_path(&mut self, path: impl AsRef<Path>) -> FileId {
        let path = normalize_path(path.as_ref());
        let key = canonical_key(&path, false);
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }

        let mut item = FileItem::unknown(path, false);
        item.refresh_local();
        self.insert(key, item)
    }

    /// Shared record for a path on the remote build host.
    ///
    /// The metadata lookup is queued and resolved together with every other
    /// pending remote lookup the first time any of them is read.
    pub fn get_remote_by_path(&mut self, path: impl AsRef<Path>) -> FileId {
        let path = normalize_remote_path(path.as_ref());
        let key = canonical_key(&path, true);
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }

        let id = self.insert(key, FileItem::unknown(path, true));
        self.pending_remote.push(id);
        id
    }

    fn insert(&mut self, key: String, item: FileItem) -> FileId {
        let id = FileId(self.items.len());
        self.items.push(item);
        let _ = self.by_key.insert(key, id);
        id
    }

    /// Look up a local path without creating a record.
    #[must_use]
    pub fn find(&self, path: impl AsRef<Path>) -> Option<FileId> {
        let path = normalize_path(path.as_ref());
        self.by_key.get(&canonical_key(&path, false)).copied()
    }

    /// Borrow a record.
    #[must_use]
    pub fn get(&self, id: FileId) -> &FileItem {
        &self.items[id.0]
    }

    /// Mutably borrow a record.
    pub fn get_mut(&mut self, id: FileId) -> &mut FileItem {
        &mut self.items[id.0]
    }

    /// Canonical key of a record, as used by the action history.
    #[must_use]
    pub fn key(&self, id: FileId) -> String {
        let item = self.get(id);
        canonical_key(&item.path, item.is_remote)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over all records.
    pub fn iter(&self) -> impl Iterator<Item = (FileId, &FileItem)> {
        self.items.iter().enumerate().map(|(i, item)| (FileId(i), item))
    }

    /// Re-stat every known local file and queue every remote file for a
    /// fresh lookup. Used after an out-of-band code generator ran.
    pub fn reset_all(&mut self) {
        let mut remote = Vec::new();
        for (index, item) in self.items.iter_mut().enumerate() {
            if item.is_remote {
                remote.push(FileId(index));
            } else {
                item.refresh_local();
            }
        }
        for id in remote {
            self.invalidate_remote(id);
        }
        tracing::debug!("Reset metadata of {} file items", self.items.len());
    }

    /// Queue a remote record for a fresh metadata lookup.
    pub fn invalidate_remote(&mut self, id: FileId) {
        if self.get(id).is_remote && !self.pending_remote.contains(&id) {
            self.pending_remote.push(id);
        }
    }

    /// Whether a remote lookup for `id` is still outstanding.
    #[must_use]
    pub fn is_pending(&self, id: FileId) -> bool {
        self.pending_remote.contains(&id)
    }

    /// Make sure the metadata of `id` is current, resolving every pending
    /// remote lookup in one round-trip if `id` is among them.
    ///
    /// # Errors
    ///
    /// Fails when a remote lookup is needed and no host is configured, or
    /// when the host reports an error.
    pub fn resolve(&mut self, id: FileId, remote: Option<&dyn RemoteHost>) -> BuildResult<()> {
        if self.is_pending(id) {
            self.resolve_pending(remote)?;
        }
        Ok(())
    }

    /// Resolve all pending remote lookups in a single batch.
    ///
    /// # Errors
    ///
    /// Fails when no host is configured or the host reports an error.
    pub fn resolve_pending(&mut self, remote: Option<&dyn RemoteHost>) -> BuildResult<()> {
        if self.pending_remote.is_empty() {
            return Ok(());
        }

        let Some(host) = remote else {
            let first = self.get(self.pending_remote[0]).path.display().to_string();
            return Err(BuildError::Remote(format!(
                "no remote host configured to resolve {first}"
            )));
        };

        let pending = std::mem::take(&mut self.pending_remote);
        let paths: Vec<PathBuf> = pending.iter().map(|&id| self.get(id).path.clone()).collect();
        tracing::debug!("Resolving {} remote file items in one batch", paths.len());

        let infos = match host.file_info(&paths) {
            Ok(infos) => infos,
            Err(e) => {
                self.pending_remote = pending;
                return Err(e);
            }
        };
        if infos.len() != pending.len() {
            self.pending_remote = pending;
            return Err(BuildError::Remote(format!(
                "asked for {} file infos, received {}",
                paths.len(),
                infos.len()
            )));
        }

        for (id, info) in pending.into_iter().zip(infos.iter()) {
            self.get_mut(id).apply_remote(info);
        }
        Ok(())
    }

    /// Delete the file behind `id`, retrying transient failures.
    ///
    /// A delete that still fails after the last attempt is logged and
    /// reported as `false`; it never aborts the build.
    pub fn delete_item(
        &mut self,
        id: FileId,
        policy: &RetryPolicy,
        remote: Option<&dyn RemoteHost>,
    ) -> bool {
        let item = self.get(id);
        let path = item.path.clone();
        let what = format!("Deleting {}", path.display());

        let result = if item.is_remote {
            match remote {
                Some(host) => retry_sync(policy, &what, || host.delete_file(&path)),
                None => Err(BuildError::Remote(format!(
                    "no remote host configured to delete {}",
                    path.display()
                ))),
            }
        } else {
            retry_sync(policy, &what, || match std::fs::remove_file(&path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(BuildError::io(&path, e)),
                _ => Ok(()),
            })
        };

        match result {
            Ok(()) => {
                self.get_mut(id).mark_deleted();
                true
            }
            Err(e) => {
                tracing::error!("Unable to delete {}: {}", path.display(), e);
                false
            }
        }
    }
}

/// Make a path absolute and lexically remove `.` and `..` components.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let _ = normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn normalize_remote_path(path: &Path) -> PathBuf {
    PathBuf::from(crate::remote::remote_path_string(path))
}

/// Identity key of a path: case-folded on case-insensitive filesystems,
/// prefixed for remote files so local and remote paths never collide.
#[must_use]
pub fn canonical_key(path: &Path, is_remote: bool) -> String {
    let text = path.to_string_lossy();
    let text = if cfg!(any(windows, target_os = "macos")) {
        text.to_lowercase()
    } else {
        text.into_owned()
    };
    if is_remote {
        format!("remote:{text}")
    } else {
        text
    }
}
