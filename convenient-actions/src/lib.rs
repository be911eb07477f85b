//! Incremental action graph engine for native-code builds.
//!
//! A build is a set of actions (compiler and linker invocations) that read
//! and write files. This crate decides which of them have to run and in
//! which order:
//!
//! - [`FileTable`]: one shared record per file path, with cached metadata
//! - [`BuildGraph`]: actions, producer links and cycle detection
//! - scheduling: dependent counts, priority sort and prerequisite closure
//! - [`OutdatedAnalyzer`]: memoized staleness analysis with command line history
//! - [`ExecutionPlanner`]: link, sort, analyze, clean up and pick what to run
//! - [`executor`]: local and pluggable distributed execution
//!
//! # Example
//!
//! ```
//! use convenient_actions::{ActionRecord, ActionType, BuildGraph};
//!
//! let mut graph = BuildGraph::new();
//! let a_cpp = graph.files.get_by_path("/project/src/a.cpp");
//! let a_o = graph.files.get_by_path("/project/obj/a.o");
//! let app = graph.files.get_by_path("/project/bin/app");
//!
//! let compile = graph.add_action(
//!     ActionRecord::new(ActionType::Compile)
//!         .with_command("clang++", "-c src/a.cpp -o obj/a.o")
//!         .with_prerequisites([a_cpp])
//!         .with_produced([a_o]),
//! );
//! let link = graph.add_action(
//!     ActionRecord::new(ActionType::Link)
//!         .with_command("clang++", "obj/a.o -o bin/app")
//!         .with_prerequisites([a_o])
//!         .with_produced([app]),
//! );
//!
//! graph.link_actions_and_items();
//! graph.detect_cycles().unwrap();
//! graph.compute_dependent_counts(5);
//! graph.sort_actions();
//!
//! assert_eq!(graph.order(), &[compile, link]);
//! assert_eq!(graph.needed_actions(&[app]).len(), 2);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod action;
pub mod config;
pub mod error;
pub mod executor;
pub mod file_item;
pub mod graph;
pub mod history;
pub mod hot_reload;
pub mod manifest;
pub mod outdated;
pub mod planner;
pub mod remote;
pub mod retry;
pub mod scheduler;
pub mod target;
pub mod visualize;

pub use action::{ActionHandler, ActionId, ActionKind, ActionRecord, ActionType, HandlerOutput};
pub use config::BuildConfiguration;
pub use error::{BuildError, BuildResult};
pub use executor::{
    BuildOutcome, ExecutionBatch, ExecutionOutcome, Executor, ExecutorError, ExecutorResult, LocalExecutor,
    execute_actions,
};
pub use file_item::{FileId, FileItem, FileTable};
pub use graph::BuildGraph;
pub use history::ActionHistory;
pub use manifest::{ActionManifest, LoadedManifest};
pub use outdated::OutdatedAnalyzer;
pub use planner::{ExecutionPlan, ExecutionPlanner};
pub use remote::{RemoteFileInfo, RemoteHost, RetryingRemoteHost};
pub use retry::RetryPolicy;
pub use scheduler::ActionPriority;
pub use target::{BuildTarget, TargetConfiguration, TargetPlatform};
pub use visualize::{VisualizationType, write_dot};
