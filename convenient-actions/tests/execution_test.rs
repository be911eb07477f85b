//! Integration tests for executing planned actions

mod common;

use async_trait::async_trait;
use common::Project;
use convenient_actions::{
    BuildError, ExecutionBatch, ExecutionOutcome, ExecutionPlanner, Executor, ExecutorResult, LocalExecutor,
    execute_actions,
};
use std::sync::Mutex;

/// Executor that records what it was asked to run and reports a fixed outcome.
struct FakeExecutor {
    name: &'static str,
    outcome: ExecutionOutcome,
    batches: Mutex<Vec<usize>>,
}

impl FakeExecutor {
    fn new(name: &'static str, outcome: ExecutionOutcome) -> Self {
        Self {
            name,
            outcome,
            batches: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, batch: &ExecutionBatch) -> ExecutorResult<ExecutionOutcome> {
        self.batches.lock().unwrap().push(batch.len());
        Ok(self.outcome)
    }
}

#[tokio::test]
async fn test_nothing_to_execute() {
    let project = Project::new();
    let config = project.config();
    let (mut graph, _, _) = project.graph(None);
    let local = FakeExecutor::new("Recording", ExecutionOutcome::AllSucceeded);

    let outcome = execute_actions(&mut graph, &[], &config, None, &local, None)
        .await
        .unwrap();

    assert_eq!(outcome.executor_name, "NoActionsToExecute");
    assert!(outcome.success);
    assert!(local.calls().is_empty());
}

#[tokio::test]
async fn test_unavailable_executor_falls_back_to_local() {
    let project = Project::new();
    project.write_outputs();
    let config = project.config();
    let (mut graph, actions, _) = project.graph(None);
    graph.link_actions_and_items();

    let distributed = FakeExecutor::new("Distributed", ExecutionOutcome::Unavailable);
    let local = FakeExecutor::new("Recording", ExecutionOutcome::AllSucceeded);
    let list = [actions.compile_a, actions.compile_b, actions.link];

    let preferred: &dyn Executor = &distributed;
    let outcome = execute_actions(&mut graph, &list, &config, Some(preferred), &local, None)
        .await
        .unwrap();

    assert_eq!(outcome.executor_name, "Recording");
    assert!(outcome.success);
    assert_eq!(outcome.executed, 3);
    assert_eq!(distributed.calls(), vec![3]);
    assert_eq!(local.calls(), vec![3]);
}

#[tokio::test]
async fn test_available_executor_is_used() {
    let project = Project::new();
    project.write_outputs();
    let config = project.config();
    let (mut graph, actions, _) = project.graph(None);
    graph.link_actions_and_items();

    let distributed = FakeExecutor::new("Distributed", ExecutionOutcome::SomeFailed);
    let local = FakeExecutor::new("Recording", ExecutionOutcome::AllSucceeded);

    let preferred: &dyn Executor = &distributed;
    let outcome = execute_actions(&mut graph, &[actions.compile_a], &config, Some(preferred), &local, None)
        .await
        .unwrap();

    assert_eq!(outcome.executor_name, "Distributed");
    assert!(!outcome.success);
    assert!(local.calls().is_empty());
}

#[tokio::test]
async fn test_missing_link_output_fails_the_build() {
    let project = Project::new();
    let config = project.config();
    let (mut graph, actions, _) = project.graph(None);
    graph.link_actions_and_items();

    // Claims success without writing anything
    let local = FakeExecutor::new("Recording", ExecutionOutcome::AllSucceeded);
    let result = execute_actions(&mut graph, &[actions.link], &config, None, &local, None).await;

    match result {
        Err(BuildError::MissingOutput(path)) => assert_eq!(path, project.path("bin/app")),
        other => panic!("expected missing output, got {other:?}"),
    }
}

#[tokio::test]
async fn test_prerequisites_deleted_on_success() {
    let project = Project::new();
    project.write_outputs();
    let config = project.config();
    let (mut graph, actions, _) = project.graph(None);
    graph.link_actions_and_items();
    graph.action_mut(actions.link).delete_prerequisites_on_success = true;

    let local = FakeExecutor::new("Recording", ExecutionOutcome::AllSucceeded);
    let outcome = execute_actions(&mut graph, &[actions.link], &config, None, &local, None)
        .await
        .unwrap();

    assert!(outcome.success);
    assert!(!project.path("obj/a.o").exists());
    assert!(!project.path("obj/b.o").exists());
    assert!(project.path("bin/app").exists());
}

#[tokio::test]
async fn test_prerequisites_kept_on_failure() {
    let project = Project::new();
    project.write_outputs();
    let config = project.config();
    let (mut graph, actions, _) = project.graph(None);
    graph.link_actions_and_items();
    graph.action_mut(actions.link).delete_prerequisites_on_success = true;

    let local = FakeExecutor::new("Recording", ExecutionOutcome::SomeFailed);
    let outcome = execute_actions(&mut graph, &[actions.link], &config, None, &local, None)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(project.path("obj/a.o").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_build_then_rebuild_is_up_to_date() {
    let project = Project::new();
    let config = project.config();
    let local = LocalExecutor::new(2);

    let (mut graph, _, app) = project.graph(None);
    let plan = ExecutionPlanner::new(&config)
        .plan(&mut graph, &[Project::target()], &[app])
        .unwrap();
    let outcome = execute_actions(&mut graph, &plan.actions_to_execute, &config, None, &local, None)
        .await
        .unwrap();

    assert_eq!(outcome.executor_name, "Local");
    assert!(outcome.success);
    assert_eq!(outcome.executed, 3);
    let linked = std::fs::read_to_string(project.path("bin/app")).unwrap();
    assert_eq!(linked, "int a() { return 1; }\nint b() { return 2; }\n");

    let (mut graph, _, app) = project.graph(None);
    let plan = ExecutionPlanner::new(&config)
        .plan(&mut graph, &[Project::target()], &[app])
        .unwrap();
    assert!(plan.is_up_to_date());

    let outcome = execute_actions(&mut graph, &plan.actions_to_execute, &config, None, &local, None)
        .await
        .unwrap();
    assert_eq!(outcome.executor_name, "NoActionsToExecute");
}
