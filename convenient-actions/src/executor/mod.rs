//! Execution of planned actions
//!
//! The planner hands over an ordered list of actions; an [`Executor`] runs
//! them while respecting producer before consumer. A distributed executor may
//! report [`ExecutionOutcome::Unavailable`], in which case the build falls back
//! to the [`LocalExecutor`].

pub mod local;

pub use local::LocalExecutor;

use crate::action::{ActionId, ActionKind, ActionType};
use crate::config::BuildConfiguration;
use crate::error::{BuildError, BuildResult};
use crate::graph::BuildGraph;
use crate::remote::RemoteHost;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors an executor can report besides plain action failures
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor cannot run anything right now
    #[error("Executor not available")]
    NotAvailable,

    /// The executor itself broke down
    #[error("Action execution failed: {0}")]
    ExecutionFailed(String),

    /// IO error while talking to the executor backend
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for executors
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Overall result of running a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every action succeeded
    AllSucceeded,
    /// At least one action failed or was never started
    SomeFailed,
    /// The executor could not take the batch
    Unavailable,
}

/// One action of a batch, detached from the graph.
#[derive(Debug, Clone)]
pub struct BatchAction {
    /// Id of the action in its graph
    pub id: ActionId,
    /// Kind of step
    pub action_type: ActionType,
    /// Status text
    pub description: String,
    /// What to run
    pub kind: ActionKind,
    /// Directory to run in
    pub working_directory: Option<PathBuf>,
    /// Indices of in-batch actions producing this action's prerequisites
    pub depends_on: Vec<usize>,
}

impl BatchAction {
    /// Program path and arguments joined the way they are recorded.
    #[must_use]
    pub fn command_line(&self) -> String {
        format!(
            "{} {}",
            self.kind.command_path().unwrap_or_default(),
            self.kind.arguments()
        )
    }
}

/// Owned snapshot of the actions to execute, in preferred order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionBatch {
    /// Actions in preferred order
    pub actions: Vec<BatchAction>,
}

impl ExecutionBatch {
    /// Snapshot `actions` from `graph`. Producers outside the batch are
    /// assumed to be up to date.
    #[must_use]
    pub fn from_graph(graph: &BuildGraph, actions: &[ActionId]) -> Self {
        let position: HashMap<ActionId, usize> = actions.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let actions = actions
            .iter()
            .map(|&id| {
                let action = graph.action(id);
                let mut depends_on: Vec<usize> = action
                    .prerequisite_items
                    .iter()
                    .filter_map(|&item| graph.producer_of(item))
                    .filter_map(|producer| position.get(&producer).copied())
                    .collect();
                depends_on.sort_unstable();
                depends_on.dedup();

                BatchAction {
                    id,
                    action_type: action.action_type,
                    description: action.status_description.clone(),
                    kind: action.kind.clone(),
                    working_directory: action.working_directory.clone(),
                    depends_on,
                }
            })
            .collect();

        Self { actions }
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Something that can run a batch of actions.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Name reported in the build outcome.
    fn name(&self) -> &str;

    /// Run every action of `batch`, never starting an action before its
    /// in-batch producers succeeded.
    async fn execute(&self, batch: &ExecutionBatch) -> ExecutorResult<ExecutionOutcome>;
}

/// Summary of [`execute_actions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Executor that ran the actions
    pub executor_name: String,
    /// Whether the build succeeded
    pub success: bool,
    /// Number of actions handed to the executor
    pub executed: usize,
}

/// Executor name reported when there is nothing to do.
pub const NO_ACTIONS_TO_EXECUTE: &str = "NoActionsToExecute";

/// Execute planned actions.
///
/// Tries `preferred` first and falls back to `local` when it is unavailable.
/// After a successful run every item produced by a link is checked to exist,
/// and prerequisites of actions flagged for it are deleted.
///
/// # Errors
///
/// Returns [`BuildError::MissingOutput`] when a link output is missing after
/// a successful run, and [`BuildError::Executor`] when an executor breaks down.
pub async fn execute_actions(
    graph: &mut BuildGraph,
    actions: &[ActionId],
    config: &BuildConfiguration,
    preferred: Option<&dyn Executor>,
    local: &dyn Executor,
    remote: Option<&dyn RemoteHost>,
) -> BuildResult<BuildOutcome> {
    if actions.is_empty() {
        tracing::info!("Target is up to date.");
        return Ok(BuildOutcome {
            executor_name: NO_ACTIONS_TO_EXECUTE.to_string(),
            success: true,
            executed: 0,
        });
    }

    let batch = ExecutionBatch::from_graph(graph, actions);

    let mut ran = None;
    if let Some(executor) = preferred {
        match executor.execute(&batch).await {
            Ok(ExecutionOutcome::Unavailable) | Err(ExecutorError::NotAvailable) => {
                tracing::info!("{} executor is unavailable, falling back to {}", executor.name(), local.name());
            }
            Ok(outcome) => ran = Some((executor.name().to_string(), outcome)),
            Err(e) => return Err(BuildError::Executor(format!("{}: {e}", executor.name()))),
        }
    }

    let (executor_name, outcome) = match ran {
        Some(ran) => ran,
        None => {
            let outcome = local
                .execute(&batch)
                .await
                .map_err(|e| BuildError::Executor(format!("{}: {e}", local.name())))?;
            (local.name().to_string(), outcome)
        }
    };

    let success = outcome == ExecutionOutcome::AllSucceeded;
    if success {
        verify_link_outputs(graph, actions, remote)?;
        delete_prerequisites_of_succeeded(graph, actions, config, remote);
    }

    tracing::info!(
        "{} executor ran {} actions: {}",
        executor_name,
        batch.len(),
        if success { "succeeded" } else { "failed" }
    );

    Ok(BuildOutcome {
        executor_name,
        success,
        executed: batch.len(),
    })
}

fn verify_link_outputs(graph: &mut BuildGraph, actions: &[ActionId], remote: Option<&dyn RemoteHost>) -> BuildResult<()> {
    for &id in actions {
        if graph.action(id).action_type != ActionType::Link {
            continue;
        }
        for item in graph.action(id).produced_items.clone() {
            if graph.files.get(item).is_remote {
                graph.files.invalidate_remote(item);
                graph.files.resolve(item, remote)?;
            } else {
                graph.files.get_mut(item).refresh_local();
            }

            let file = graph.files.get(item);
            if !file.exists {
                return Err(BuildError::MissingOutput(file.path.clone()));
            }
        }
    }
    Ok(())
}

fn delete_prerequisites_of_succeeded(
    graph: &mut BuildGraph,
    actions: &[ActionId],
    config: &BuildConfiguration,
    remote: Option<&dyn RemoteHost>,
) {
    for &id in actions {
        if !graph.action(id).delete_prerequisites_on_success {
            continue;
        }
        for item in graph.action(id).prerequisite_items.clone() {
            let _ = graph.files.delete_item(item, &config.delete_retry, remote);
        }
    }
}
