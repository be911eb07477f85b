//! Sweep of stale numbered hot-reload binaries.
//!
//! Hot reload links a module under a new numbered name each time, e.g.
//! `Game-Module-0042-Linux-Debug.so`. Once the un-numbered binary is relinked
//! the numbered leftovers for the same platform and configuration are junk.

use crate::action::ActionType;
use crate::graph::BuildGraph;
use crate::target::{TargetConfiguration, TargetPlatform};
use std::path::{Path, PathBuf};

/// File name split into its base and the suffixes that identify a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFilename {
    /// Path without extension and suffixes
    pub base: String,
    /// `-<Platform>` or empty
    pub platform_suffix: String,
    /// `-<Configuration>` or empty
    pub config_suffix: String,
    /// `.<ext>` or empty
    pub extension: String,
}

/// Strip the extension, then a `-<Configuration>` suffix, then a
/// `-<Platform>` suffix from `path`.
#[must_use]
pub fn split_filename(path: &Path) -> SplitFilename {
    let full = path.to_string_lossy();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut working = full.strip_suffix(extension.as_str()).unwrap_or(&full);

    let mut config_suffix = String::new();
    for configuration in TargetConfiguration::ALL {
        let suffix = format!("-{}", configuration.as_str());
        if let Some(stripped) = working.strip_suffix(&suffix) {
            working = stripped;
            config_suffix = suffix;
            break;
        }
    }

    let mut platform_suffix = String::new();
    for platform in TargetPlatform::ALL {
        let suffix = format!("-{}", platform.as_str());
        if let Some(stripped) = working.strip_suffix(&suffix) {
            working = stripped;
            platform_suffix = suffix;
            break;
        }
    }

    SplitFilename {
        base: working.to_string(),
        platform_suffix,
        config_suffix,
        extension,
    }
}

/// Files next to `item` that belong to older hot-reload links of it.
#[must_use]
pub fn find_stale_hot_reload_files(item: &Path) -> Vec<PathBuf> {
    let split = split_filename(item);
    let pattern = format!(
        "{}-*{}{}{}",
        glob::Pattern::escape(&split.base),
        glob::Pattern::escape(&split.platform_suffix),
        glob::Pattern::escape(&split.config_suffix),
        glob::Pattern::escape(&split.extension)
    );

    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Invalid hot reload pattern {}: {}", pattern, e);
            return Vec::new();
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|junk| junk.as_path() != item && junk.is_file())
        .filter(|junk| {
            let junk_split = split_filename(junk);
            junk_split.platform_suffix == split.platform_suffix && junk_split.config_suffix == split.config_suffix
        })
        .collect()
}

/// Delete stale numbered siblings of every flagged item produced by a link.
/// Returns the deleted paths. Failures are logged and skipped.
pub fn delete_stale_hot_reload_files(graph: &BuildGraph) -> Vec<PathBuf> {
    let mut deleted = Vec::new();
    for &id in graph.order() {
        let action = graph.action(id);
        if action.action_type != ActionType::Link {
            continue;
        }
        for &produced in &action.produced_items {
            let item = graph.files.get(produced);
            if !item.needs_hot_reload_cleanup || item.is_remote {
                continue;
            }
            for junk in find_stale_hot_reload_files(&item.path) {
                tracing::info!("Deleting old hot reload file: {}", junk.display());
                match std::fs::remove_file(&junk) {
                    Ok(()) => deleted.push(junk),
                    Err(e) => tracing::info!("Unable to delete old hot reload file {}: {}", junk.display(), e),
                }
            }
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionRecord;
    use tempfile::TempDir;

    #[test]
    fn test_split_filename() {
        let split = split_filename(Path::new("/bin/Game-Core-Win64-DebugGame.dll"));
        assert_eq!(split.base, "/bin/Game-Core");
        assert_eq!(split.platform_suffix, "-Win64");
        assert_eq!(split.config_suffix, "-DebugGame");
        assert_eq!(split.extension, ".dll");

        let plain = split_filename(Path::new("/bin/Game-Core.so"));
        assert_eq!(plain.base, "/bin/Game-Core");
        assert!(plain.platform_suffix.is_empty());
        assert!(plain.config_suffix.is_empty());
    }

    #[test]
    fn test_split_filename_without_extension() {
        let split = split_filename(Path::new("/bin/tool-Linux-Shipping"));
        assert_eq!(split.base, "/bin/tool");
        assert_eq!(split.platform_suffix, "-Linux");
        assert_eq!(split.config_suffix, "-Shipping");
        assert_eq!(split.extension, "");
    }

    #[test]
    fn test_sweep_deletes_only_matching_suffixes() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        for name in [
            "Game-Core-Linux-Debug.so",
            "Game-Core-0001-Linux-Debug.so",
            "Game-Core-0002-Linux-Debug.so",
            "Game-Core-0003-Linux-Shipping.so",
            "Game-Other-0001-Linux-Debug.so",
        ] {
            std::fs::write(dir.join(name), "x").unwrap();
        }

        let mut graph = BuildGraph::new();
        let core = graph.files.get_by_path(dir.join("Game-Core-Linux-Debug.so"));
        graph.files.get_mut(core).needs_hot_reload_cleanup = true;
        let _ = graph.add_action(
            ActionRecord::new(ActionType::Link)
                .with_command("ld", "core")
                .with_produced([core]),
        );

        let mut deleted = delete_stale_hot_reload_files(&graph);
        deleted.sort();

        assert_eq!(
            deleted,
            vec![
                dir.join("Game-Core-0001-Linux-Debug.so"),
                dir.join("Game-Core-0002-Linux-Debug.so"),
            ]
        );
        assert!(dir.join("Game-Core-Linux-Debug.so").exists());
        assert!(dir.join("Game-Core-0003-Linux-Shipping.so").exists());
        assert!(dir.join("Game-Other-0001-Linux-Debug.so").exists());
    }

    #[test]
    fn test_unflagged_items_are_left_alone() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("App-0001.so"), "x").unwrap();

        let mut graph = BuildGraph::new();
        let app = graph.files.get_by_path(tmp.path().join("App.so"));
        let _ = graph.add_action(ActionRecord::new(ActionType::Link).with_produced([app]));

        assert!(delete_stale_hot_reload_files(&graph).is_empty());
        assert!(tmp.path().join("App-0001.so").exists());
    }
}
