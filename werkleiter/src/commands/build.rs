//! Build command: plan, then run the outdated actions locally

use convenient_actions::{BuildConfiguration, BuildGraph, ExecutionPlanner, LocalExecutor, execute_actions};
use std::path::Path;
use std::time::Instant;

/// Build every requested output of `manifest`.
pub async fn execute(
    manifest: &Path,
    config: &BuildConfiguration,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start_time = Instant::now();

    println!("📋 Manifest: {}", manifest.display());
    let mut loaded = BuildGraph::from_manifest(manifest)?;
    println!("  ✓ Actions:  {}", loaded.graph.action_count());
    println!("  ✓ Files:    {}", loaded.graph.files.len());
    println!();

    let plan = ExecutionPlanner::new(config).plan(&mut loaded.graph, &loaded.targets, &loaded.outputs)?;
    println!("📊 Plan:");
    println!("  Needed:     {}", plan.needed.len());
    println!("  Outdated:   {}", plan.outdated.len());
    println!("  To execute: {}", plan.actions_to_execute.len());
    if !plan.deleted_items.is_empty() {
        println!("  Deleted:    {} stale produced items", plan.deleted_items.len());
    }
    println!();

    let local = LocalExecutor::from_config(config);
    tracing::debug!("Local executor runs up to {} actions at once", local.max_parallel());

    let outcome = execute_actions(&mut loaded.graph, &plan.actions_to_execute, config, None, &local, None).await?;

    let elapsed = start_time.elapsed();
    if outcome.success {
        println!(
            "✅ Build succeeded: {} actions via {} in {:.2}s",
            outcome.executed,
            outcome.executor_name,
            elapsed.as_secs_f64()
        );
        Ok(())
    } else {
        Err(format!("build failed after {:.2}s ({} executor)", elapsed.as_secs_f64(), outcome.executor_name).into())
    }
}
