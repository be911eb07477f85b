//! Local process executor
//!
//! Runs actions as child processes (or in-process handlers) on this machine,
//! bounded by a semaphore. Actions are started in the planner's preferred
//! order as soon as their in-batch producers have succeeded. After the first
//! failure nothing new is started; running actions are allowed to finish.

use super::{BatchAction, ExecutionBatch, ExecutionOutcome, Executor, ExecutorResult};
use crate::action::ActionKind;
use crate::config::BuildConfiguration;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Executor that runs actions on the local machine.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    max_parallel: usize,
}

impl LocalExecutor {
    /// Executor running at most `max_parallel` actions at once.
    #[must_use]
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    /// Executor sized from the build configuration.
    #[must_use]
    pub fn from_config(config: &BuildConfiguration) -> Self {
        Self::new(config.max_parallel_actions)
    }

    /// Maximum number of concurrently running actions.
    #[must_use]
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    fn name(&self) -> &str {
        "Local"
    }

    async fn execute(&self, batch: &ExecutionBatch) -> ExecutorResult<ExecutionOutcome> {
        let total = batch.len();
        info!("Performing {} actions ({} in parallel)", total, self.max_parallel);

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut states = vec![State::Pending; total];
        let mut running = JoinSet::new();
        let mut started = 0;
        let mut failed = false;

        loop {
            if !failed {
                for index in 0..total {
                    let ready = states[index] == State::Pending
                        && batch.actions[index]
                            .depends_on
                            .iter()
                            .all(|&dep| states[dep] == State::Succeeded);
                    if !ready {
                        continue;
                    }

                    states[index] = State::Running;
                    started += 1;
                    let action = batch.actions[index].clone();
                    let semaphore = Arc::clone(&semaphore);
                    let label = format!("[{started}/{total}]");
                    let _ = running.spawn(async move {
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return (index, false);
                        };
                        info!("{} {}", label, action.description);
                        (index, run_action(&action).await)
                    });
                }
            }

            match running.join_next().await {
                None => break,
                Some(Ok((index, success))) => {
                    states[index] = if success { State::Succeeded } else { State::Failed };
                    if !success {
                        failed = true;
                    }
                }
                Some(Err(e)) => {
                    error!("Action task panicked: {}", e);
                    failed = true;
                }
            }
        }

        let succeeded = states.iter().filter(|&&s| s == State::Succeeded).count();
        debug!("{} of {} actions succeeded", succeeded, total);

        Ok(if succeeded == total {
            ExecutionOutcome::AllSucceeded
        } else {
            ExecutionOutcome::SomeFailed
        })
    }
}

async fn run_action(action: &BatchAction) -> bool {
    match &action.kind {
        ActionKind::Structural => true,
        ActionKind::RunCommand { .. } => run_command(action).await,
        ActionKind::RunHandler { handler, arguments } => {
            let handler = Arc::clone(handler);
            let arguments = arguments.clone();
            let working_directory = action.working_directory.clone();
            match tokio::task::spawn_blocking(move || handler.run(&arguments, working_directory.as_deref())).await {
                Ok(output) => {
                    if !output.output.is_empty() {
                        info!("{}", output.output.trim_end());
                    }
                    if output.exit_code != 0 {
                        error!("{} failed with exit code {}", action.description, output.exit_code);
                    }
                    output.exit_code == 0
                }
                Err(e) => {
                    error!("{} handler panicked: {}", action.description, e);
                    false
                }
            }
        }
    }
}

fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        let _ = command.arg("/C").arg(command_line);
        command
    } else {
        let mut command = Command::new("sh");
        let _ = command.arg("-c").arg(command_line);
        command
    }
}

async fn run_command(action: &BatchAction) -> bool {
    let command_line = action.command_line();
    debug!("Running: {}", command_line);

    let mut command = shell_command(&command_line);
    if let Some(dir) = &action.working_directory {
        let _ = command.current_dir(dir);
    }

    match command.output().await {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                info!("{}", stdout.trim_end());
            }
            if output.status.success() {
                true
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                error!(
                    "{} failed ({}): {}",
                    action.description,
                    output.status,
                    stderr.trim_end()
                );
                false
            }
        }
        Err(e) => {
            error!("Failed to start {}: {}", command_line, e);
            false
        }
    }
}
