//! Build actions: one compile, link or packaging step with explicit inputs
//! and outputs.

use crate::file_item::FileId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Index of an action inside a [`crate::BuildGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub(crate) usize);

impl ActionId {
    /// Position of the action in its graph.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({})", self.0)
    }
}

/// Kind of build step. Informational only; the algorithms treat all kinds
/// alike except for the post-link output check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Build an external project
    BuildProject,
    /// Compile one translation unit
    Compile,
    /// Assemble an application bundle
    CreateAppBundle,
    /// Produce debug information
    GenerateDebugInfo,
    /// Link objects into a binary or library
    Link,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BuildProject => "BuildProject",
            Self::Compile => "Compile",
            Self::CreateAppBundle => "CreateAppBundle",
            Self::GenerateDebugInfo => "GenerateDebugInfo",
            Self::Link => "Link",
        };
        f.write_str(name)
    }
}

/// Result of running an [`ActionHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutput {
    /// Process-style exit code, 0 on success
    pub exit_code: i32,
    /// Captured output
    pub output: String,
}

/// In-process replacement for a command line.
pub trait ActionHandler: Send + Sync {
    /// Name used in logs and in the recorded command line.
    fn name(&self) -> &str;

    /// Run the action. `arguments` is the action's argument string.
    fn run(&self, arguments: &str, working_directory: Option<&std::path::Path>) -> HandlerOutput;
}

/// What executing an action means.
#[derive(Clone, Default)]
pub enum ActionKind {
    /// Bookkeeping node with nothing to run
    #[default]
    Structural,
    /// Spawn `path` with `arguments`
    RunCommand {
        /// Program to run
        path: String,
        /// Argument string
        arguments: String,
    },
    /// Dispatch to an in-process handler
    RunHandler {
        /// The handler capability
        handler: Arc<dyn ActionHandler>,
        /// Argument string passed to the handler
        arguments: String,
    },
}

impl fmt::Debug for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural => f.write_str("Structural"),
            Self::RunCommand { path, arguments } => f
                .debug_struct("RunCommand")
                .field("path", path)
                .field("arguments", arguments)
                .finish(),
            Self::RunHandler { handler, arguments } => f
                .debug_struct("RunHandler")
                .field("handler", &handler.name())
                .field("arguments", arguments)
                .finish(),
        }
    }
}

impl ActionKind {
    /// Program path, or the handler name.
    #[must_use]
    pub fn command_path(&self) -> Option<&str> {
        match self {
            Self::Structural => None,
            Self::RunCommand { path, .. } => Some(path),
            Self::RunHandler { handler, .. } => Some(handler.name()),
        }
    }

    /// Argument string, empty for structural actions.
    #[must_use]
    pub fn arguments(&self) -> &str {
        match self {
            Self::Structural => "",
            Self::RunCommand { arguments, .. } | Self::RunHandler { arguments, .. } => arguments,
        }
    }

    /// Whether there is anything to execute.
    #[must_use]
    pub fn has_command(&self) -> bool {
        !matches!(self, Self::Structural)
    }
}

/// One unit of build work.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    /// Kind of step
    pub action_type: ActionType,
    /// What to run
    pub kind: ActionKind,
    /// Directory to run in
    pub working_directory: Option<PathBuf>,
    /// Short text shown while the action runs
    pub status_description: String,
    /// Custom cost; linking adds the produced items' costs to it
    pub relative_cost: i64,
    /// Delete prerequisites once the action succeeded
    pub delete_prerequisites_on_success: bool,
    /// Delete produced items before running when the action is outdated
    pub delete_produced_items_before_run: bool,
    /// Produced `.lib` files are import libraries
    pub produces_import_library: bool,
    /// Number of actions depending on this one, filled in by the scheduler
    pub dependent_action_count: usize,
    /// Files this action reads
    pub prerequisite_items: Vec<FileId>,
    /// Files this action writes
    pub produced_items: Vec<FileId>,
    /// Item cost added to `relative_cost` by the last link
    pub(crate) linked_item_cost: i64,
}

impl ActionRecord {
    /// Create an action of the given type with nothing to run.
    #[must_use]
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            kind: ActionKind::Structural,
            working_directory: None,
            status_description: "...".to_string(),
            relative_cost: 0,
            delete_prerequisites_on_success: false,
            delete_produced_items_before_run: false,
            produces_import_library: false,
            dependent_action_count: 0,
            prerequisite_items: Vec::new(),
            produced_items: Vec::new(),
            linked_item_cost: 0,
        }
    }

    /// Set a command line.
    #[must_use]
    pub fn with_command(mut self, path: impl Into<String>, arguments: impl Into<String>) -> Self {
        self.kind = ActionKind::RunCommand {
            path: path.into(),
            arguments: arguments.into(),
        };
        self
    }

    /// Set an in-process handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ActionHandler>, arguments: impl Into<String>) -> Self {
        self.kind = ActionKind::RunHandler {
            handler,
            arguments: arguments.into(),
        };
        self
    }

    /// Set the status description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.status_description = description.into();
        self
    }

    /// Add prerequisite files.
    #[must_use]
    pub fn with_prerequisites(mut self, items: impl IntoIterator<Item = FileId>) -> Self {
        self.prerequisite_items.extend(items);
        self
    }

    /// Add produced files.
    #[must_use]
    pub fn with_produced(mut self, items: impl IntoIterator<Item = FileId>) -> Self {
        self.produced_items.extend(items);
        self
    }

    /// Command line recorded in the action history: path, a space, arguments.
    #[must_use]
    pub fn command_line(&self) -> String {
        format!(
            "{} {}",
            self.kind.command_path().unwrap_or_default(),
            self.kind.arguments()
        )
    }
}

impl fmt::Display for ActionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = self.kind.command_path() {
            write!(f, "{path} - ")?;
        }
        f.write_str(self.kind.arguments())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stamp;

    impl ActionHandler for Stamp {
        fn name(&self) -> &str {
            "stamp"
        }

        fn run(&self, _arguments: &str, _working_directory: Option<&std::path::Path>) -> HandlerOutput {
            HandlerOutput {
                exit_code: 0,
                output: String::new(),
            }
        }
    }

    #[test]
    fn test_command_line() {
        let action = ActionRecord::new(ActionType::Compile).with_command("clang++", "-c a.cpp -o a.o");
        assert_eq!(action.command_line(), "clang++ -c a.cpp -o a.o");
        assert_eq!(action.to_string(), "clang++ - -c a.cpp -o a.o");
        assert!(action.kind.has_command());
    }

    #[test]
    fn test_structural_action_has_no_command() {
        let action = ActionRecord::new(ActionType::BuildProject);
        assert!(!action.kind.has_command());
        assert_eq!(action.command_line(), " ");
    }

    #[test]
    fn test_handler_action() {
        let action = ActionRecord::new(ActionType::CreateAppBundle).with_handler(Arc::new(Stamp), "App.app");
        assert!(action.kind.has_command());
        assert_eq!(action.command_line(), "stamp App.app");
        assert!(format!("{:?}", action.kind).contains("stamp"));
    }
}
