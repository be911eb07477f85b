//! Execution planning: from a linked action graph and a set of requested
//! outputs to the ordered list of actions that must run.

use crate::action::ActionId;
use crate::config::BuildConfiguration;
use crate::error::{BuildError, BuildResult};
use crate::file_item::FileId;
use crate::graph::BuildGraph;
use crate::history::ActionHistory;
use crate::hot_reload::delete_stale_hot_reload_files;
use crate::outdated::OutdatedAnalyzer;
use crate::remote::RemoteHost;
use crate::target::BuildTarget;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Outcome of a planning pass.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    /// Actions to run, in preferred order
    pub actions_to_execute: Vec<ActionId>,
    /// Actions required for the requested outputs
    pub needed: HashSet<ActionId>,
    /// Every outdated action of the graph
    pub outdated: HashSet<ActionId>,
    /// Produced items deleted before execution
    pub deleted_items: Vec<FileId>,
    /// Stale hot-reload binaries removed
    pub deleted_hot_reload_files: Vec<PathBuf>,
}

impl ExecutionPlan {
    /// Whether nothing needs to run.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.actions_to_execute.is_empty()
    }
}

/// Runs the planning pass over a [`BuildGraph`].
pub struct ExecutionPlanner<'a> {
    config: &'a BuildConfiguration,
    remote: Option<&'a dyn RemoteHost>,
    dry_run: bool,
}

impl<'a> ExecutionPlanner<'a> {
    /// Planner for local files only.
    #[must_use]
    pub fn new(config: &'a BuildConfiguration) -> Self {
        Self {
            config,
            remote: None,
            dry_run: false,
        }
    }

    /// Use `remote` for files on the remote build host.
    #[must_use]
    pub fn with_remote(mut self, remote: &'a dyn RemoteHost) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Only report what would execute. Nothing is deleted, no directory is
    /// created and no action history is saved, so a later build still sees
    /// every changed command line.
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Plan the build of `outputs` for `targets`.
    ///
    /// The steps run in a fixed order. Most importantly, outdated produced
    /// items are deleted before the action histories are saved, so a saved
    /// history never vouches for a file that was just removed.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CycleDetected`] for a cyclic graph, and
    /// propagates remote metadata, history and directory creation failures.
    pub fn plan(
        &self,
        graph: &mut BuildGraph,
        targets: &[BuildTarget],
        outputs: &[FileId],
    ) -> BuildResult<ExecutionPlan> {
        graph.link_actions_and_items();
        let deleted_hot_reload_files = if self.dry_run {
            Vec::new()
        } else {
            delete_stale_hot_reload_files(graph)
        };

        graph.detect_cycles()?;

        graph.compute_dependent_counts(self.config.dependent_count_depth);
        graph.sort_actions();

        let needed = graph.needed_actions(outputs);

        let mut histories = self.load_histories(targets);
        let outdated = self.gather_outdated(graph, &mut histories)?;

        let mut deleted_items = Vec::new();
        if self.dry_run {
            tracing::debug!("Dry run: keeping outdated items and action histories");
        } else {
            deleted_items = self.delete_outdated_produced_items(graph, &outdated);

            for history in &mut histories {
                history.save()?;
            }

            self.create_directories_for_produced_items(graph, &outdated)?;
        }

        let actions_to_execute: Vec<ActionId> = graph
            .order()
            .iter()
            .copied()
            .filter(|id| needed.contains(id) && outdated.contains(id))
            .filter(|&id| graph.action(id).kind.has_command())
            .collect();

        tracing::debug!(
            "{} actions needed, {} outdated, {} to execute",
            needed.len(),
            outdated.len(),
            actions_to_execute.len()
        );

        Ok(ExecutionPlan {
            actions_to_execute,
            needed,
            outdated,
            deleted_items,
            deleted_hot_reload_files,
        })
    }

    /// One history per distinct history file.
    fn load_histories(&self, targets: &[BuildTarget]) -> Vec<ActionHistory> {
        let mut seen = HashSet::new();
        let mut histories = Vec::new();
        for target in targets {
            let path = ActionHistory::generate_path_for_target(&self.config.intermediate_dir, target);
            if seen.insert(path.clone()) {
                histories.push(ActionHistory::load(path));
            }
        }
        if histories.is_empty() {
            tracing::debug!("No targets given, command lines are not tracked");
            histories.push(ActionHistory::in_memory());
        }
        histories
    }

    /// Analyze every action once per history and merge the verdicts: an
    /// action is outdated if any history finds it outdated.
    fn gather_outdated(
        &self,
        graph: &mut BuildGraph,
        histories: &mut [ActionHistory],
    ) -> BuildResult<HashSet<ActionId>> {
        let mut merged: HashMap<ActionId, bool> = HashMap::new();
        for history in histories.iter_mut() {
            let mut analyzer = OutdatedAnalyzer::new(self.config, self.remote);
            for (id, outdated) in analyzer.gather_all_outdated_actions(graph, history)? {
                *merged.entry(id).or_default() |= outdated;
            }
        }
        Ok(merged
            .into_iter()
            .filter_map(|(id, outdated)| outdated.then_some(id))
            .collect())
    }

    fn delete_outdated_produced_items(&self, graph: &mut BuildGraph, outdated: &HashSet<ActionId>) -> Vec<FileId> {
        let mut deleted = Vec::new();
        let order = graph.order().to_vec();
        for id in order.into_iter().filter(|id| outdated.contains(id)) {
            let action = graph.action(id);
            let delete_before_run = action.delete_produced_items_before_run;
            for item in action.produced_items.clone() {
                let file = graph.files.get(item);
                let must_delete = self.config.delete_all_outdated_produced_items
                    || (!self.config.use_incremental_linking && file.has_extension("pdb"))
                    || delete_before_run;
                if !file.exists || !must_delete {
                    continue;
                }

                tracing::debug!("Deleting outdated item: {}", file.path.display());
                if graph.files.delete_item(item, &self.config.delete_retry, self.remote) {
                    deleted.push(item);
                }
            }
        }
        deleted
    }

    fn create_directories_for_produced_items(
        &self,
        graph: &BuildGraph,
        outdated: &HashSet<ActionId>,
    ) -> BuildResult<()> {
        let mut created = HashSet::new();
        for &id in graph.order().iter().filter(|id| outdated.contains(id)) {
            for &item in &graph.action(id).produced_items {
                let file = graph.files.get(item);
                let Some(directory) = file.path.parent() else {
                    continue;
                };
                if !created.insert((directory.to_path_buf(), file.is_remote)) {
                    continue;
                }

                if file.is_remote {
                    let host = self.remote.ok_or_else(|| {
                        BuildError::Remote(format!(
                            "no remote host configured to create {}",
                            directory.display()
                        ))
                    })?;
                    host.make_directory(directory)?;
                } else if !directory.exists() {
                    std::fs::create_dir_all(directory).map_err(|e| BuildError::io(directory, e))?;
                }
            }
        }
        Ok(())
    }
}
