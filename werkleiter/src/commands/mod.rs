//! Werkleiter command-line interface
//!
//! - `build`: plan and execute a manifest
//! - `plan`: dry run, list what would execute
//! - `graph`: export the action graph as DOT

use clap::{Parser, Subcommand};
use convenient_actions::BuildConfiguration;
use std::path::{Path, PathBuf};

pub mod build;
pub mod graph;
pub mod plan;

/// Werkleiter - incremental build driver for action manifests
#[derive(Parser)]
#[command(name = "werkleiter")]
#[command(about = "Incremental build driver for action manifests")]
#[command(version)]
pub struct Cli {
    /// Build configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan and execute the outdated actions of a manifest
    Build {
        /// Path to the action manifest
        manifest: PathBuf,

        /// Maximum number of actions to run concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Ignore command line changes when checking for outdated actions
        #[arg(long)]
        no_action_history: bool,

        /// Delete every produced item of outdated actions before running them
        #[arg(long)]
        delete_all_outdated: bool,
    },

    /// Show which actions would execute, in order
    Plan {
        /// Path to the action manifest
        manifest: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the action graph in DOT format
    Graph {
        /// Path to the action manifest
        manifest: PathBuf,

        /// Include file nodes
        #[arg(long)]
        with_files: bool,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Configuration from `path`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<BuildConfiguration, Box<dyn std::error::Error + Send + Sync>> {
    match path {
        Some(path) => Ok(BuildConfiguration::from_file(path)?),
        None => Ok(BuildConfiguration::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::parse_from([
            "werkleiter",
            "--verbose",
            "build",
            "app.json",
            "--jobs",
            "4",
            "--no-action-history",
        ]);

        assert!(cli.verbose);
        match cli.command {
            Commands::Build {
                manifest,
                jobs,
                no_action_history,
                delete_all_outdated,
            } => {
                assert_eq!(manifest, PathBuf::from("app.json"));
                assert_eq!(jobs, Some(4));
                assert!(no_action_history);
                assert!(!delete_all_outdated);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, BuildConfiguration::default());
    }
}
