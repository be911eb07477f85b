//! Graph command: DOT export of a manifest's action graph

use convenient_actions::{BuildGraph, VisualizationType, write_dot};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Write the DOT graph of `manifest` to `output`, or stdout.
pub fn execute(
    manifest: &Path,
    with_files: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut loaded = BuildGraph::from_manifest(manifest)?;
    loaded.graph.link_actions_and_items();

    let actions = loaded.graph.order().to_vec();
    let kind = if with_files {
        VisualizationType::ActionsWithFiles
    } else {
        VisualizationType::OnlyActions
    };

    match output {
        Some(path) => {
            let file = File::create(path)?;
            write_dot(&loaded.graph, &actions, kind, BufWriter::new(file))?;
            println!("✓ Wrote {} actions to {}", actions.len(), path.display());
        }
        None => write_dot(&loaded.graph, &actions, kind, std::io::stdout().lock())?,
    }
    Ok(())
}
