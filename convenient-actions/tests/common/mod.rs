//! Shared fixture: a two-file C++ project compiled and linked with `sh`.

#![allow(dead_code)]

use convenient_actions::{
    ActionId, ActionRecord, ActionType, BuildConfiguration, BuildGraph, BuildTarget, FileId, RetryPolicy,
    TargetConfiguration, TargetPlatform,
};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub struct Actions {
    pub compile_a: ActionId,
    pub compile_b: ActionId,
    pub link: ActionId,
}

pub struct Project {
    pub tmp: TempDir,
    /// Modification time of the sources; outputs are written after it
    pub base: SystemTime,
}

impl Project {
    pub fn new() -> Self {
        let project = Self {
            tmp: TempDir::new().unwrap(),
            base: SystemTime::now() - Duration::from_secs(3600),
        };
        project.write("src/a.cpp", "int a() { return 1; }\n", project.base);
        project.write("src/b.cpp", "int b() { return 2; }\n", project.base);
        project
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.tmp.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str, mtime: SystemTime) {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        set_mtime(&path, mtime);
    }

    /// Pretend a previous build produced every output.
    pub fn write_outputs(&self) {
        self.write("obj/a.o", "a", self.base + Duration::from_secs(50));
        self.write("obj/b.o", "b", self.base + Duration::from_secs(50));
        self.write("bin/app", "app", self.base + Duration::from_secs(100));
    }

    pub fn config(&self) -> BuildConfiguration {
        BuildConfiguration {
            intermediate_dir: self.path("Intermediate"),
            delete_retry: RetryPolicy::no_retry(),
            ..BuildConfiguration::default()
        }
    }

    pub fn target() -> BuildTarget {
        BuildTarget::new("App", TargetPlatform::Linux, TargetConfiguration::Development)
    }

    pub fn history_path(&self) -> PathBuf {
        self.path("Intermediate/Linux/App/Development/ActionHistory.json")
    }

    pub fn compile_arguments(&self, source: &str, object: &str) -> String {
        format!(
            "-c 'cat {} > {}'",
            self.path(source).display(),
            self.path(object).display()
        )
    }

    /// Graph of the project, with optional override of the compile
    /// arguments of `a.cpp`.
    pub fn graph(&self, compile_a_arguments: Option<&str>) -> (BuildGraph, Actions, FileId) {
        let mut graph = BuildGraph::new();
        let a_cpp = graph.files.get_by_path(self.path("src/a.cpp"));
        let b_cpp = graph.files.get_by_path(self.path("src/b.cpp"));
        let a_o = graph.files.get_by_path(self.path("obj/a.o"));
        let b_o = graph.files.get_by_path(self.path("obj/b.o"));
        let app = graph.files.get_by_path(self.path("bin/app"));

        let a_arguments = compile_a_arguments
            .map_or_else(|| self.compile_arguments("src/a.cpp", "obj/a.o"), str::to_string);
        let compile_a = graph.add_action(
            ActionRecord::new(ActionType::Compile)
                .with_command("sh", a_arguments)
                .with_description("a.cpp")
                .with_prerequisites([a_cpp])
                .with_produced([a_o]),
        );
        let compile_b = graph.add_action(
            ActionRecord::new(ActionType::Compile)
                .with_command("sh", self.compile_arguments("src/b.cpp", "obj/b.o"))
                .with_description("b.cpp")
                .with_prerequisites([b_cpp])
                .with_produced([b_o]),
        );
        let link = graph.add_action(
            ActionRecord::new(ActionType::Link)
                .with_command(
                    "sh",
                    format!(
                        "-c 'cat {} {} > {}'",
                        self.path("obj/a.o").display(),
                        self.path("obj/b.o").display(),
                        self.path("bin/app").display()
                    ),
                )
                .with_description("app")
                .with_prerequisites([a_o, b_o])
                .with_produced([app]),
        );

        (
            graph,
            Actions {
                compile_a,
                compile_b,
                link,
            },
            app,
        )
    }
}

pub fn set_mtime(path: &Path, mtime: SystemTime) {
    filetime::set_file_mtime(path, FileTime::from_system_time(mtime)).unwrap();
}
