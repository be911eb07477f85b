//! The build graph: every action of one build plus the file registry they
//! share, with producer linking and cycle detection.
//!
//! A new build starts from a new [`BuildGraph`]; there is no process-wide
//! action list.

use crate::action::{ActionId, ActionRecord};
use crate::error::{BuildError, BuildResult};
use crate::file_item::{FileId, FileTable};
use std::fmt::Write as _;

/// All actions and file records of one build.
#[derive(Debug, Default, Clone)]
pub struct BuildGraph {
    /// Shared file registry
    pub files: FileTable,
    actions: Vec<ActionRecord>,
    /// Preferred execution order; reordered by the scheduler
    order: Vec<ActionId>,
}

impl BuildGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action and return its id.
    pub fn add_action(&mut self, action: ActionRecord) -> ActionId {
        let id = ActionId(self.actions.len());
        self.actions.push(action);
        self.order.push(id);
        id
    }

    /// Borrow an action.
    #[must_use]
    pub fn action(&self, id: ActionId) -> &ActionRecord {
        &self.actions[id.0]
    }

    /// Mutably borrow an action.
    pub fn action_mut(&mut self, id: ActionId) -> &mut ActionRecord {
        &mut self.actions[id.0]
    }

    /// Actions in the current preferred order.
    #[must_use]
    pub fn order(&self) -> &[ActionId] {
        &self.order
    }

    pub(crate) fn set_order(&mut self, order: Vec<ActionId>) {
        self.order = order;
    }

    /// Number of actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Action producing `file`, if any.
    #[must_use]
    pub fn producer_of(&self, file: FileId) -> Option<ActionId> {
        self.files.get(file).producing_action
    }

    /// Wire every produced file to its producing action and accumulate the
    /// produced files' costs into the action's relative cost.
    ///
    /// Each file is assumed to have at most one producer; that is up to
    /// whoever built the actions. Linking again replaces the item cost added
    /// by the previous link instead of adding it twice.
    pub fn link_actions_and_items(&mut self) {
        for (index, action) in self.actions.iter_mut().enumerate() {
            let mut item_cost = 0;
            for &produced in &action.produced_items {
                let item = self.files.get_mut(produced);
                item.producing_action = Some(ActionId(index));
                item_cost += item.relative_cost;
            }
            action.relative_cost += item_cost - action.linked_item_cost;
            action.linked_item_cost = item_cost;
        }
        tracing::debug!("Linked {} actions to their produced items", self.actions.len());
    }

    /// Check that the action graph is acyclic.
    ///
    /// Starting from actions whose prerequisites are all unproduced, the set of
    /// known acyclic actions grows until a full pass adds nothing. Whatever is
    /// left lies on, between or downstream of cycles; only the members of
    /// strongly connected components with a cycle are reported.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CycleDetected`] describing each offending action.
    pub fn detect_cycles(&self) -> BuildResult<()> {
        let mut acyclic = vec![false; self.actions.len()];
        let mut acyclic_count = 0;

        loop {
            let mut found_new = false;
            for &id in &self.order {
                if acyclic[id.0] {
                    continue;
                }
                let only_acyclic_producers = self.actions[id.0]
                    .prerequisite_items
                    .iter()
                    .filter_map(|&item| self.producer_of(item))
                    .all(|producer| acyclic[producer.0]);
                if only_acyclic_producers {
                    acyclic[id.0] = true;
                    acyclic_count += 1;
                    found_new = true;
                }
            }
            if !found_new {
                break;
            }
        }

        if acyclic_count == self.actions.len() {
            return Ok(());
        }

        let unresolved = self.cycle_members(&acyclic);
        let description = self.describe_actions(&unresolved);
        tracing::error!("Action graph contains cycle!\n\n{}", description);

        Err(BuildError::CycleDetected {
            actions: unresolved,
            description,
        })
    }

    /// Producers of `id`'s prerequisites that are still unresolved.
    fn unresolved_producers(&self, id: ActionId, acyclic: &[bool]) -> Vec<ActionId> {
        let mut producers: Vec<ActionId> = self.actions[id.0]
            .prerequisite_items
            .iter()
            .filter_map(|&item| self.producer_of(item))
            .filter(|producer| !acyclic[producer.0])
            .collect();
        producers.sort_unstable();
        producers.dedup();
        producers
    }

    /// Unresolved actions that sit on a cycle: members of a strongly connected
    /// component with more than one action, or actions consuming their own
    /// output. Uses Tarjan's algorithm with an explicit stack.
    fn cycle_members(&self, acyclic: &[bool]) -> Vec<ActionId> {
        const UNVISITED: usize = usize::MAX;

        let count = self.actions.len();
        let mut index_of = vec![UNVISITED; count];
        let mut low_link = vec![0; count];
        let mut on_stack = vec![false; count];
        let mut component_stack: Vec<ActionId> = Vec::new();
        let mut on_cycle = vec![false; count];
        let mut next_index = 0;

        for &root in self.order.iter().filter(|id| !acyclic[id.0]) {
            if index_of[root.0] != UNVISITED {
                continue;
            }

            // (action, its unresolved producers, next producer to visit)
            let mut frames = vec![(root, self.unresolved_producers(root, acyclic), 0)];
            index_of[root.0] = next_index;
            low_link[root.0] = next_index;
            next_index += 1;
            component_stack.push(root);
            on_stack[root.0] = true;

            while let Some(top) = frames.len().checked_sub(1) {
                let (id, next) = (frames[top].0, frames[top].2);
                if let Some(&producer) = frames[top].1.get(next) {
                    frames[top].2 += 1;
                    if index_of[producer.0] == UNVISITED {
                        index_of[producer.0] = next_index;
                        low_link[producer.0] = next_index;
                        next_index += 1;
                        component_stack.push(producer);
                        on_stack[producer.0] = true;
                        frames.push((producer, self.unresolved_producers(producer, acyclic), 0));
                    } else if on_stack[producer.0] {
                        low_link[id.0] = low_link[id.0].min(index_of[producer.0]);
                    }
                    continue;
                }

                let _ = frames.pop();
                if let Some(parent) = frames.last() {
                    low_link[parent.0.0] = low_link[parent.0.0].min(low_link[id.0]);
                }
                if low_link[id.0] != index_of[id.0] {
                    continue;
                }

                let mut component = Vec::new();
                while let Some(member) = component_stack.pop() {
                    on_stack[member.0] = false;
                    component.push(member);
                    if member == id {
                        break;
                    }
                }
                let self_loop = component.len() == 1 && self.unresolved_producers(id, acyclic).contains(&id);
                if component.len() > 1 || self_loop {
                    for member in component {
                        on_cycle[member.0] = true;
                    }
                }
            }
        }

        self.order.iter().copied().filter(|id| on_cycle[id.0]).collect()
    }

    /// Multi-line dump of actions with their inputs and outputs.
    #[must_use]
    pub fn describe_actions(&self, ids: &[ActionId]) -> String {
        let mut description = String::new();
        for &id in ids {
            let action = self.action(id);
            let _ = writeln!(
                description,
                "Action: {}",
                action.kind.command_path().unwrap_or_default()
            );
            let _ = writeln!(description, "\twith arguments: {}", action.kind.arguments());
            for &item in &action.prerequisite_items {
                let _ = writeln!(description, "\tdepends on: {}", self.files.get(item).path.display());
            }
            for &item in &action.produced_items {
                let _ = writeln!(description, "\tproduces:   {}", self.files.get(item).path.display());
            }
            description.push_str("\n\n");
        }
        description
    }
}
