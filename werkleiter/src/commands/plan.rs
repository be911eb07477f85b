//! Plan command: dry run listing the actions that would execute

use convenient_actions::{ActionId, BuildConfiguration, BuildGraph, ExecutionPlanner};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct PlannedAction {
    index: usize,
    action_type: String,
    description: String,
    command: String,
    dependents: usize,
}

fn planned_actions(graph: &BuildGraph, actions: &[ActionId]) -> Vec<PlannedAction> {
    actions
        .iter()
        .map(|&id| {
            let action = graph.action(id);
            PlannedAction {
                index: id.index(),
                action_type: action.action_type.to_string(),
                description: action.status_description.clone(),
                command: action.command_line(),
                dependents: action.dependent_action_count,
            }
        })
        .collect()
}

/// Plan `manifest` and print what would run.
///
/// Read-only: nothing is deleted and action histories are left untouched, so
/// a following build still rebuilds actions whose command line changed.
pub fn execute(
    manifest: &Path,
    config: &BuildConfiguration,
    json: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut loaded = BuildGraph::from_manifest(manifest)?;
    let plan = ExecutionPlanner::new(config)
        .dry_run()
        .plan(&mut loaded.graph, &loaded.targets, &loaded.outputs)?;
    let planned = planned_actions(&loaded.graph, &plan.actions_to_execute);

    if json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    if planned.is_empty() {
        println!("✓ Target is up to date");
        return Ok(());
    }

    println!("{} actions to execute:", planned.len());
    for (position, action) in planned.iter().enumerate() {
        println!(
            "  {:>4}. [{}] {} ({} dependents)",
            position + 1,
            action.action_type,
            action.description,
            action.dependents
        );
        tracing::debug!("       {}", action.command);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_actions::{ActionRecord, ActionType, RetryPolicy};
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, arguments: &str) -> std::path::PathBuf {
        let manifest = dir.join("app.json");
        let content = serde_json::json!({
            "targets": [{ "name": "App", "platform": "Linux", "configuration": "Development" }],
            "actions": [{
                "type": "Compile",
                "command_path": "cc",
                "command_arguments": arguments,
                "prerequisites": ["a.cpp"],
                "produced": ["a.o"]
            }],
            "outputs": ["a.o"]
        });
        std::fs::write(&manifest, content.to_string()).unwrap();
        manifest
    }

    fn pending(manifest: &Path, config: &BuildConfiguration) -> usize {
        let mut loaded = BuildGraph::from_manifest(manifest).unwrap();
        ExecutionPlanner::new(config)
            .plan(&mut loaded.graph, &loaded.targets, &loaded.outputs)
            .unwrap()
            .actions_to_execute
            .len()
    }

    #[test]
    fn test_plan_leaves_changed_command_lines_for_the_build() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.cpp"), "int a;").unwrap();
        std::fs::write(tmp.path().join("a.o"), "a").unwrap();
        let config = BuildConfiguration {
            intermediate_dir: tmp.path().join("Intermediate"),
            delete_retry: RetryPolicy::no_retry(),
            ..BuildConfiguration::default()
        };

        let manifest = write_manifest(tmp.path(), "-O0 -c a.cpp");
        let _ = pending(&manifest, &config);
        assert_eq!(pending(&manifest, &config), 0);

        let manifest = write_manifest(tmp.path(), "-O2 -c a.cpp");
        execute(&manifest, &config, false).unwrap();

        assert_eq!(pending(&manifest, &config), 1);
    }

    #[test]
    fn test_planned_actions_carry_dependent_counts() {
        let mut graph = BuildGraph::new();
        let src = graph.files.get_by_path("/p/a.cpp");
        let obj = graph.files.get_by_path("/p/a.o");
        let app = graph.files.get_by_path("/p/app");
        let compile = graph.add_action(
            ActionRecord::new(ActionType::Compile)
                .with_command("cc", "-c a.cpp")
                .with_description("a.cpp")
                .with_prerequisites([src])
                .with_produced([obj]),
        );
        let link = graph.add_action(
            ActionRecord::new(ActionType::Link)
                .with_command("ld", "a.o")
                .with_prerequisites([obj])
                .with_produced([app]),
        );
        graph.link_actions_and_items();
        graph.compute_dependent_counts(5);

        let planned = planned_actions(&graph, &[compile, link]);

        assert_eq!(planned[0].description, "a.cpp");
        assert_eq!(planned[0].dependents, 1);
        assert_eq!(planned[0].command, "cc -c a.cpp");
        assert_eq!(planned[1].action_type, "Link");
        assert_eq!(planned[1].dependents, 0);
    }
}
