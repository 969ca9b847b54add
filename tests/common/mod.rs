//! Shared test infrastructure for integration tests.
//!
//! Each integration test crate compiles this module independently and uses
//! a different subset of it.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A throwaway repository layout for driving the binary.
pub struct ProjectFixture {
    root: TempDir,
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("create temp project"),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Write a file under the project root, creating parent directories.
    pub fn write(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.root.path().join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent directory");
        }
        std::fs::write(&path, contents).expect("write fixture file");
        path
    }
}

/// Run the built binary with the given arguments.
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_n8n-gitops"))
        .args(args)
        .env_remove("N8N_API_URL")
        .env_remove("N8N_API_KEY")
        .output()
        .expect("run n8n-gitops binary")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
