//! Graphviz export of the action graph

use crate::action::ActionId;
use crate::error::{BuildError, BuildResult};
use crate::graph::BuildGraph;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

/// What to include in the exported graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualizationType {
    /// Action nodes with producer to consumer edges
    #[default]
    OnlyActions,
    /// Action and file nodes with prerequisite and produced edges
    ActionsWithFiles,
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn action_label(graph: &BuildGraph, id: ActionId) -> String {
    let action = graph.action(id);
    let tool = action
        .kind
        .command_path()
        .map(|path| {
            Path::new(path)
                .file_name()
                .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    format!(
        "{} {}\\n{}",
        action.action_type,
        escape(&tool),
        escape(&action.status_description)
    )
}

/// Render `actions` as a DOT digraph.
#[must_use]
pub fn to_dot(graph: &BuildGraph, actions: &[ActionId], kind: VisualizationType) -> String {
    let included: HashSet<ActionId> = actions.iter().copied().collect();
    let mut output = String::new();

    output.push_str("digraph actions {\n");
    output.push_str("  rankdir=LR;\n");
    output.push_str("  node [shape=box];\n\n");

    for &id in actions {
        let _ = writeln!(output, "  a{} [label=\"{}\"];", id.index(), action_label(graph, id));
    }
    output.push('\n');

    match kind {
        VisualizationType::OnlyActions => {
            for &id in actions {
                let producers: BTreeSet<ActionId> = graph
                    .action(id)
                    .prerequisite_items
                    .iter()
                    .filter_map(|&item| graph.producer_of(item))
                    .filter(|producer| included.contains(producer))
                    .collect();
                for producer in producers {
                    let _ = writeln!(output, "  a{} -> a{};", producer.index(), id.index());
                }
            }
        }
        VisualizationType::ActionsWithFiles => {
            let files: BTreeSet<_> = actions
                .iter()
                .flat_map(|&id| {
                    let action = graph.action(id);
                    action.prerequisite_items.iter().chain(action.produced_items.iter())
                })
                .copied()
                .collect();
            for &file in &files {
                let _ = writeln!(
                    output,
                    "  f{} [label=\"{}\", shape=note];",
                    file.index(),
                    escape(&graph.files.get(file).display_name())
                );
            }
            output.push('\n');
            for &id in actions {
                let action = graph.action(id);
                for &item in &action.prerequisite_items {
                    let _ = writeln!(output, "  f{} -> a{};", item.index(), id.index());
                }
                for &item in &action.produced_items {
                    let _ = writeln!(output, "  a{} -> f{};", id.index(), item.index());
                }
            }
        }
    }

    output.push_str("}\n");
    output
}

/// Write the DOT rendering of `actions` to `writer`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_dot(
    graph: &BuildGraph,
    actions: &[ActionId],
    kind: VisualizationType,
    mut writer: impl Write,
) -> BuildResult<()> {
    writer
        .write_all(to_dot(graph, actions, kind).as_bytes())
        .map_err(|e| BuildError::io("<dot output>", e))
}
