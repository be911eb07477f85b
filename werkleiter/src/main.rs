//! Werkleiter - incremental build driver
//!
//! Loads an action manifest, plans which actions are outdated and runs them
//! on the local executor.

use clap::Parser;
use commands::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "werkleiter=debug,convenient_actions=debug"
    } else {
        "werkleiter=info,convenient_actions=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Build {
            manifest,
            jobs,
            no_action_history,
            delete_all_outdated,
        } => {
            let mut config = config;
            if let Some(jobs) = jobs {
                config.max_parallel_actions = jobs.max(1);
            }
            if no_action_history {
                config.use_action_history = false;
            }
            if delete_all_outdated {
                config.delete_all_outdated_produced_items = true;
            }
            commands::build::execute(&manifest, &config).await
        }
        Commands::Plan { manifest, json } => commands::plan::execute(&manifest, &config, json),
        Commands::Graph {
            manifest,
            with_files,
            output,
        } => commands::graph::execute(&manifest, with_files, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}
