//! Staleness analysis.
//!
//! An action is outdated when one of its produced items is missing, empty,
//! or was produced by a different command line, when a prerequisite is newer
//! than its oldest produced item, or when the producer of a prerequisite is
//! itself outdated. Verdicts are memoized for one planning pass.
//!
//! The producer chain is walked with an explicit stack of frames rather than
//! by recursion, so arbitrarily deep dependency chains cannot overflow the
//! call stack. Each frame is the state one recursive call would hold.

use crate::action::ActionId;
use crate::config::BuildConfiguration;
use crate::error::BuildResult;
use crate::file_item::FileId;
use crate::graph::BuildGraph;
use crate::history::ActionHistory;
use crate::remote::RemoteHost;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Analysis state of one action whose verdict is not known yet.
#[derive(Debug)]
struct Frame {
    action: ActionId,
    outdated: bool,
    /// Oldest produced item; `None` means no produced item counted
    last_execution_time: Option<DateTime<Utc>>,
    next_prerequisite: usize,
}

/// Memoizing staleness analysis for one planning pass.
pub struct OutdatedAnalyzer<'a> {
    config: &'a BuildConfiguration,
    remote: Option<&'a dyn RemoteHost>,
    memo: HashMap<ActionId, bool>,
}

impl<'a> OutdatedAnalyzer<'a> {
    /// Create an analyzer with an empty memo table.
    #[must_use]
    pub fn new(config: &'a BuildConfiguration, remote: Option<&'a dyn RemoteHost>) -> Self {
        Self {
            config,
            remote,
            memo: HashMap::new(),
        }
    }

    /// Verdicts computed so far.
    #[must_use]
    pub fn memo(&self) -> &HashMap<ActionId, bool> {
        &self.memo
    }

    /// Whether `root` is outdated. Evaluates and memoizes every producer
    /// reached on the way.
    ///
    /// # Errors
    ///
    /// Fails only when remote file metadata cannot be resolved.
    pub fn is_outdated(
        &mut self,
        graph: &mut BuildGraph,
        root: ActionId,
        history: &mut ActionHistory,
    ) -> BuildResult<bool> {
        if let Some(&outdated) = self.memo.get(&root) {
            return Ok(outdated);
        }

        let mut stack = vec![self.check_produced_items(graph, root, history)?];
        let mut on_stack = HashSet::from([root]);

        while let Some(top) = stack.len().checked_sub(1) {
            let action = stack[top].action;
            let prerequisite = graph
                .action(action)
                .prerequisite_items
                .get(stack[top].next_prerequisite)
                .copied();

            let Some(item) = prerequisite.filter(|_| !stack[top].outdated) else {
                let outdated = stack[top].outdated;
                let _ = stack.pop();
                let _ = on_stack.remove(&action);
                let _ = self.memo.insert(action, outdated);
                continue;
            };

            if self.is_ignored_import_library(graph, item) {
                stack[top].next_prerequisite += 1;
                continue;
            }

            if let Some(producer) = graph.producer_of(item) {
                match self.memo.get(&producer) {
                    Some(true) => {
                        tracing::debug!(
                            "{}: Prerequisite {} is produced by outdated action.",
                            graph.action(action).status_description,
                            graph.files.get(item).display_name()
                        );
                        stack[top].outdated = true;
                        continue;
                    }
                    Some(false) => {}
                    // Only reachable on a cyclic graph
                    None if on_stack.contains(&producer) => {}
                    None => {
                        // Revisit this prerequisite once the producer is memoized
                        let frame = self.check_produced_items(graph, producer, history)?;
                        let _ = on_stack.insert(producer);
                        stack.push(frame);
                        continue;
                    }
                }
            }

            if self.is_newer_than(graph, item, stack[top].last_execution_time)? {
                tracing::debug!(
                    "{}: Prerequisite {} is newer than the last execution of the action.",
                    graph.action(action).status_description,
                    graph.files.get(item).display_name()
                );
                stack[top].outdated = true;
            }
            stack[top].next_prerequisite += 1;
        }

        Ok(self.memo.get(&root).copied().unwrap_or(true))
    }

    /// Verdicts for every action of the graph, sharing this analyzer's memo.
    ///
    /// # Errors
    ///
    /// Fails only when remote file metadata cannot be resolved.
    pub fn gather_all_outdated_actions(
        &mut self,
        graph: &mut BuildGraph,
        history: &mut ActionHistory,
    ) -> BuildResult<HashMap<ActionId, bool>> {
        let order = graph.order().to_vec();
        let mut verdicts = HashMap::with_capacity(order.len());
        for id in order {
            let outdated = self.is_outdated(graph, id, history)?;
            let _ = verdicts.insert(id, outdated);
        }
        Ok(verdicts)
    }

    /// First half of the analysis: command line history, existence and size
    /// of each produced item, and the oldest produced timestamp.
    ///
    /// History entries are updated for every produced item even when the
    /// action is already known to be outdated.
    fn check_produced_items(
        &self,
        graph: &mut BuildGraph,
        id: ActionId,
        history: &mut ActionHistory,
    ) -> BuildResult<Frame> {
        let command_line = graph.action(id).command_line();
        let produced = graph.action(id).produced_items.clone();
        let description = graph.action(id).status_description.clone();

        let mut frame = Frame {
            action: id,
            outdated: false,
            last_execution_time: None,
            next_prerequisite: 0,
        };

        for item in produced {
            if self.config.use_action_history && history.is_persistent() {
                let key = graph.files.key(item);
                if history.update_producing_command_line(&key, &command_line) {
                    tracing::debug!(
                        "{}: Produced item {} was produced by outdated command line.",
                        description,
                        graph.files.get(item).display_name()
                    );
                    frame.outdated = true;
                }
            }

            graph.files.resolve(item, self.remote)?;
            let file = graph.files.get(item);

            if !file.exists {
                tracing::debug!("{}: Produced item {} doesn't exist.", description, file.display_name());
                frame.outdated = true;
            } else if !file.is_remote && !file.is_directory && file.length == 0 {
                tracing::debug!("{}: Produced item {} is empty.", description, file.display_name());
                frame.outdated = true;
            } else if self.config.use_incremental_linking
                && (file.has_extension("lib") || file.has_extension("exp") || file.has_extension("pdb"))
            {
                // Incremental links do not always touch these
            } else if let Some(written) = file.last_write_time {
                frame.last_execution_time = Some(
                    frame
                        .last_execution_time
                        .map_or(written, |oldest| oldest.min(written)),
                );
            }
        }

        Ok(frame)
    }

    fn is_ignored_import_library(&self, graph: &BuildGraph, item: FileId) -> bool {
        self.config.ignore_outdated_import_libraries
            && graph
                .producer_of(item)
                .is_some_and(|producer| graph.action(producer).produces_import_library)
            && graph.files.get(item).has_extension("lib")
    }

    /// Whether `item` exists and was written more than the slop after
    /// `last_execution_time`.
    fn is_newer_than(
        &self,
        graph: &mut BuildGraph,
        item: FileId,
        last_execution_time: Option<DateTime<Utc>>,
    ) -> BuildResult<bool> {
        graph.files.resolve(item, self.remote)?;
        let file = graph.files.get(item);
        if !file.exists {
            return Ok(false);
        }
        let (Some(written), Some(last)) = (file.last_write_time, last_execution_time) else {
            return Ok(false);
        };
        Ok(written - last > self.config.timestamp_slop())
    }
}
