//! Action ordering: dependent counts, priority sort and prerequisite closure.

use crate::action::ActionId;
use crate::file_item::FileId;
use crate::graph::BuildGraph;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Sort key of an action. Greater means run earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPriority {
    /// Number of actions depending on this one
    pub dependent_count: usize,
    /// Relative cost of the action
    pub relative_cost: i64,
    /// Number of prerequisite items
    pub prerequisite_count: usize,
}

impl Ord for ActionPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // 1. Most dependents first, to unblock downstream work
        // 2. Most expensive first, to avoid a long pole at the end
        // 3. Most prerequisites first
        self.dependent_count
            .cmp(&other.dependent_count)
            .then(self.relative_cost.cmp(&other.relative_cost))
            .then(self.prerequisite_count.cmp(&other.prerequisite_count))
    }
}

impl PartialOrd for ActionPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl BuildGraph {
    /// Priority of an action, using its current dependent count.
    #[must_use]
    pub fn priority(&self, id: ActionId) -> ActionPriority {
        let action = self.action(id);
        ActionPriority {
            dependent_count: action.dependent_action_count,
            relative_cost: action.relative_cost,
            prerequisite_count: action.prerequisite_items.len(),
        }
    }

    /// Fill in `dependent_action_count` for every action.
    ///
    /// Each pass records direct dependents and folds in what is already known
    /// about those dependents, so transitive dependents travel one hop per
    /// pass. The count is exact for chains no deeper than `passes`; deeper
    /// graphs get an approximation, which only affects sort quality.
    pub fn compute_dependent_counts(&mut self, passes: usize) {
        let mut dependents: HashMap<ActionId, HashSet<ActionId>> = HashMap::new();

        for _ in 0..passes {
            for &id in self.order() {
                for &item in &self.action(id).prerequisite_items {
                    let Some(producer) = self.producer_of(item) else {
                        continue;
                    };
                    let known = dependents.get(&id).cloned().unwrap_or_default();
                    let set = dependents.entry(producer).or_default();
                    let _ = set.insert(id);
                    set.extend(known);
                }
            }
        }

        let ids: Vec<ActionId> = self.order().to_vec();
        for id in ids {
            self.action_mut(id).dependent_action_count = dependents.get(&id).map_or(0, HashSet::len);
        }
    }

    /// Reorder actions by descending [`ActionPriority`]. The sort is stable,
    /// so equal actions keep their relative order.
    pub fn sort_actions(&mut self) {
        let mut order = self.order().to_vec();
        order.sort_by(|a, b| self.priority(*b).cmp(&self.priority(*a)));
        self.set_order(order);
        tracing::debug!("Sorted {} actions by dependent count and cost", self.action_count());
    }

    /// Add the producer of `output`, and transitively the producers of all
    /// its prerequisites, to `result`. Producers already in `result` are not
    /// walked again.
    pub fn gather_prerequisite_actions(&self, output: FileId, result: &mut HashSet<ActionId>) {
        let mut pending = vec![output];
        while let Some(item) = pending.pop() {
            let Some(producer) = self.producer_of(item) else {
                continue;
            };
            if result.insert(producer) {
                pending.extend(self.action(producer).prerequisite_items.iter().copied());
            }
        }
    }

    /// Prerequisite closure over several outputs.
    #[must_use]
    pub fn needed_actions(&self, outputs: &[FileId]) -> HashSet<ActionId> {
        let mut needed = HashSet::new();
        for &output in outputs {
            self.gather_prerequisite_actions(output, &mut needed);
        }
        needed
    }
}
