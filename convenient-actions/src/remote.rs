//! Remote build host capability
//!
//! Files that live on a remote build host are never stat'ed locally; their
//! metadata, directory creation and deletion go through a [`RemoteHost`].
//! The transport itself is supplied by the caller.

use crate::error::BuildResult;
use crate::retry::{RetryPolicy, retry_sync};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Metadata reported by the remote host for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileInfo {
    /// Whether the path exists on the remote host
    pub exists: bool,
    /// Last modification time (UTC)
    pub last_write_time: Option<DateTime<Utc>>,
    /// Size in bytes, -1 when unknown
    pub length: i64,
}

impl RemoteFileInfo {
    /// Info for a path that does not exist.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            exists: false,
            last_write_time: None,
            length: -1,
        }
    }
}

/// Operations the action graph needs from a remote build host.
pub trait RemoteHost: Send + Sync {
    /// Fetch metadata for a batch of paths in one round-trip.
    ///
    /// The result has one entry per requested path, in request order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BuildError::Remote`] on transport failures.
    fn file_info(&self, paths: &[PathBuf]) -> BuildResult<Vec<RemoteFileInfo>>;

    /// Create a directory (and its parents) on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BuildError::Remote`] on transport failures.
    fn make_directory(&self, path: &Path) -> BuildResult<()>;

    /// Delete a file on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BuildError::Remote`] on transport failures.
    fn delete_file(&self, path: &Path) -> BuildResult<()>;
}

/// Wraps a [`RemoteHost`] so that every call is retried under a policy.
pub struct RetryingRemoteHost<H> {
    inner: H,
    policy: RetryPolicy,
}

impl<H: RemoteHost> RetryingRemoteHost<H> {
    /// Wrap `inner`, retrying calls according to `policy`.
    pub fn new(inner: H, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Access the wrapped host.
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: RemoteHost> RemoteHost for RetryingRemoteHost<H> {
    fn file_info(&self, paths: &[PathBuf]) -> BuildResult<Vec<RemoteFileInfo>> {
        retry_sync(&self.policy, "Remote file info", || self.inner.file_info(paths))
    }

    fn make_directory(&self, path: &Path) -> BuildResult<()> {
        let what = format!("Remote mkdir {}", path.display());
        retry_sync(&self.policy, &what, || self.inner.make_directory(path))
    }

    fn delete_file(&self, path: &Path) -> BuildResult<()> {
        let what = format!("Remote delete {}", path.display());
        retry_sync(&self.policy, &what, || self.inner.delete_file(path))
    }
}

/// Normalize a remote path to forward slashes.
#[must_use]
pub fn remote_path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FlakyHost {
        failures_left: Mutex<usize>,
        calls: Mutex<usize>,
    }

    impl RemoteHost for FlakyHost {
        fn file_info(&self, paths: &[PathBuf]) -> BuildResult<Vec<RemoteFileInfo>> {
            *self.calls.lock().unwrap() += 1;
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(BuildError::Remote("connection reset".to_string()));
            }
            Ok(paths.iter().map(|_| RemoteFileInfo::missing()).collect())
        }

        fn make_directory(&self, _path: &Path) -> BuildResult<()> {
            Err(BuildError::Remote("permission denied".to_string()))
        }

        fn delete_file(&self, _path: &Path) -> BuildResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_retrying_host_recovers_from_transient_errors() {
        let host = RetryingRemoteHost::new(
            FlakyHost {
                failures_left: Mutex::new(2),
                calls: Mutex::new(0),
            },
            RetryPolicy::fixed(7, Duration::from_millis(1)),
        );

        let info = host.file_info(&[PathBuf::from("/remote/a.o")]).unwrap();
        assert_eq!(info, vec![RemoteFileInfo::missing()]);
        assert_eq!(*host.inner().calls.lock().unwrap(), 3);
    }

    #[test]
    fn test_retrying_host_propagates_final_error() {
        let host = RetryingRemoteHost::new(
            FlakyHost {
                failures_left: Mutex::new(0),
                calls: Mutex::new(0),
            },
            RetryPolicy::fixed(2, Duration::from_millis(1)),
        );

        let result = host.make_directory(Path::new("/remote/out"));
        assert!(matches!(result, Err(BuildError::Remote(_))));
    }

    #[test]
    fn test_remote_path_string() {
        assert_eq!(remote_path_string(Path::new(r"C:\build\out")), "C:/build/out");
    }
}
