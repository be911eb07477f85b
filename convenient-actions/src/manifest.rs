//! JSON action manifest: the serialized form of a build graph as produced by
//! a project generator.
//!
//! ```json
//! {
//!   "targets": [{ "name": "App", "platform": "Linux", "configuration": "Debug" }],
//!   "actions": [{
//!     "type": "Compile",
//!     "command_path": "clang++",
//!     "command_arguments": "-c src/a.cpp -o obj/a.o",
//!     "prerequisites": ["src/a.cpp"],
//!     "produced": ["obj/a.o"]
//!   }],
//!   "outputs": ["bin/app"]
//! }
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use crate::action::{ActionRecord, ActionType};
use crate::error::{BuildError, BuildResult};
use crate::file_item::FileId;
use crate::graph::BuildGraph;
use crate::target::BuildTarget;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One action as written in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAction {
    /// Kind of build step
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Program to run; omitted for structural actions
    #[serde(default)]
    pub command_path: Option<String>,
    /// Argument string
    #[serde(default)]
    pub command_arguments: String,
    /// Directory to run in
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Status text; defaults to the first produced file name
    #[serde(default)]
    pub status_description: Option<String>,
    /// Files read
    #[serde(default)]
    pub prerequisites: Vec<PathBuf>,
    /// Files written
    #[serde(default)]
    pub produced: Vec<PathBuf>,
    /// Custom relative cost
    #[serde(default)]
    pub relative_cost: i64,
    /// Delete prerequisites after success
    #[serde(default)]
    pub delete_prerequisites_on_success: bool,
    /// Delete produced items before running
    #[serde(default)]
    pub delete_produced_items_before_run: bool,
    /// Produced `.lib` files are import libraries
    #[serde(default)]
    pub produces_import_library: bool,
    /// Sweep stale numbered hot-reload siblings of the produced items
    #[serde(default)]
    pub hot_reload_cleanup: bool,
}

/// A serialized build graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionManifest {
    /// Targets whose action histories apply
    #[serde(default)]
    pub targets: Vec<BuildTarget>,
    /// All actions
    pub actions: Vec<ManifestAction>,
    /// Requested outputs
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

/// Build graph materialized from a manifest.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    /// The graph, not yet linked
    pub graph: BuildGraph,
    /// Targets listed in the manifest
    pub targets: Vec<BuildTarget>,
    /// Records of the requested outputs
    pub outputs: Vec<FileId>,
}

impl ActionManifest {
    /// Parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> BuildResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| BuildError::Manifest(format!("{}: {e}", path.display())))
    }

    /// Create file and action records, resolving relative paths against
    /// `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Manifest`] if two actions produce the same file.
    pub fn build(&self, base_dir: &Path) -> BuildResult<LoadedManifest> {
        let mut graph = BuildGraph::new();
        let mut producers: HashMap<FileId, usize> = HashMap::new();

        for (index, entry) in self.actions.iter().enumerate() {
            let prerequisites: Vec<FileId> = entry
                .prerequisites
                .iter()
                .map(|p| graph.files.get_by_path(base_dir.join(p)))
                .collect();
            let produced: Vec<FileId> = entry
                .produced
                .iter()
                .map(|p| graph.files.get_by_path(base_dir.join(p)))
                .collect();

            for &item in &produced {
                if let Some(previous) = producers.insert(item, index) {
                    return Err(BuildError::Manifest(format!(
                        "{} is produced by actions {} and {}",
                        graph.files.get(item).path.display(),
                        previous,
                        index
                    )));
                }
                if entry.hot_reload_cleanup {
                    graph.files.get_mut(item).needs_hot_reload_cleanup = true;
                }
            }

            let description = entry.status_description.clone().unwrap_or_else(|| {
                produced
                    .first()
                    .map(|&item| graph.files.get(item).display_name())
                    .unwrap_or_else(|| "...".to_string())
            });

            let mut action = ActionRecord::new(entry.action_type)
                .with_description(description)
                .with_prerequisites(prerequisites)
                .with_produced(produced);
            if let Some(path) = &entry.command_path {
                action = action.with_command(path.clone(), entry.command_arguments.clone());
            }
            action.working_directory = entry.working_directory.as_ref().map(|dir| base_dir.join(dir));
            action.relative_cost = entry.relative_cost;
            action.delete_prerequisites_on_success = entry.delete_prerequisites_on_success;
            action.delete_produced_items_before_run = entry.delete_produced_items_before_run;
            action.produces_import_library = entry.produces_import_library;

            let _ = graph.add_action(action);
        }

        let outputs: Vec<FileId> = self
            .outputs
            .iter()
            .map(|p| graph.files.get_by_path(base_dir.join(p)))
            .collect();
        for &output in &outputs {
            if !producers.contains_key(&output) {
                tracing::warn!(
                    "Requested output {} is not produced by any action",
                    graph.files.get(output).path.display()
                );
            }
        }

        tracing::debug!(
            "Loaded {} actions and {} file items from manifest",
            graph.action_count(),
            graph.files.len()
        );

        Ok(LoadedManifest {
            graph,
            targets: self.targets.clone(),
            outputs,
        })
    }
}

impl BuildGraph {
    /// Load a manifest file and build its graph. Relative paths resolve
    /// against the manifest's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read, parsed or built.
    pub fn from_manifest(path: &Path) -> BuildResult<LoadedManifest> {
        let manifest = ActionManifest::from_file(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.build(base_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "targets": [{ "name": "App", "platform": "Linux", "configuration": "Debug" }],
        "actions": [
            {
                "type": "Compile",
                "command_path": "clang++",
                "command_arguments": "-c src/a.cpp -o obj/a.o",
                "prerequisites": ["src/a.cpp"],
                "produced": ["obj/a.o"]
            },
            {
                "type": "Link",
                "command_path": "clang++",
                "command_arguments": "obj/a.o -o bin/app",
                "status_description": "Linking app",
                "prerequisites": ["obj/a.o"],
                "produced": ["bin/app"],
                "hot_reload_cleanup": true
            },
            { "type": "BuildProject", "produced": ["bin/app.stamp"] }
        ],
        "outputs": ["bin/app"]
    }"#;

    #[test]
    fn test_load_manifest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("actions.json");
        std::fs::write(&path, MANIFEST).unwrap();

        let loaded = BuildGraph::from_manifest(&path).unwrap();
        let graph = &loaded.graph;

        assert_eq!(graph.action_count(), 3);
        assert_eq!(loaded.targets.len(), 1);
        assert_eq!(loaded.outputs.len(), 1);

        let order = graph.order();
        let compile = graph.action(order[0]);
        assert_eq!(compile.status_description, "a.o");
        assert_eq!(
            graph.files.get(compile.prerequisite_items[0]).path,
            tmp.path().join("src/a.cpp")
        );

        let link = graph.action(order[1]);
        assert_eq!(link.status_description, "Linking app");
        assert!(graph.files.get(link.produced_items[0]).needs_hot_reload_cleanup);
        assert_eq!(link.prerequisite_items[0], compile.produced_items[0]);

        assert!(matches!(graph.action(order[2]).kind, ActionKind::Structural));
    }

    #[test]
    fn test_duplicate_producer_is_rejected() {
        let manifest: ActionManifest = serde_json::from_str(
            r#"{ "actions": [
                { "type": "Compile", "command_path": "cc", "produced": ["a.o"] },
                { "type": "Compile", "command_path": "cc", "produced": ["./a.o"] }
            ] }"#,
        )
        .unwrap();

        let result = manifest.build(Path::new("/work"));
        assert!(matches!(result, Err(BuildError::Manifest(msg)) if msg.contains("a.o")));
    }

    #[test]
    fn test_invalid_manifest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("actions.json");
        std::fs::write(&path, r#"{ "actions": [{ "type": "Bake" }] }"#).unwrap();

        assert!(matches!(BuildGraph::from_manifest(&path), Err(BuildError::Manifest(_))));
    }
}
