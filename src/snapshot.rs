//! Read-only snapshots of the repository tree.
//!
//! A snapshot reads either the live working tree or an arbitrary git
//! revision (via `git show`), so a deploy can target exactly what is
//! committed at a ref rather than whatever happens to be on disk.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// File access scoped to a repository root.
pub trait Snapshot {
    fn read_text(&self, rel_path: &str) -> Result<String>;
    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>>;
    fn exists(&self, rel_path: &str) -> bool;
}

/// Snapshot backed by the live working tree.
pub struct WorkingTreeSnapshot {
    repo_root: PathBuf,
}

impl WorkingTreeSnapshot {
    pub fn new(repo_root: PathBuf) -> Self {
        Self { repo_root }
    }
}

impl Snapshot for WorkingTreeSnapshot {
    fn read_text(&self, rel_path: &str) -> Result<String> {
        std::fs::read_to_string(self.repo_root.join(rel_path))
            .map_err(|err| Error::Snapshot(format!("failed to read {rel_path}: {err}")))
    }

    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>> {
        std::fs::read(self.repo_root.join(rel_path))
            .map_err(|err| Error::Snapshot(format!("failed to read {rel_path}: {err}")))
    }

    fn exists(&self, rel_path: &str) -> bool {
        self.repo_root.join(rel_path).is_file()
    }
}

/// Snapshot backed by a git ref, read through `git show <ref>:<path>`.
pub struct GitRefSnapshot {
    repo_root: PathBuf,
    git_ref: String,
}

impl GitRefSnapshot {
    pub fn new(repo_root: PathBuf, git_ref: String) -> Self {
        Self { repo_root, git_ref }
    }
}

impl Snapshot for GitRefSnapshot {
    fn read_text(&self, rel_path: &str) -> Result<String> {
        let bytes = self.read_bytes(rel_path)?;
        String::from_utf8(bytes).map_err(|err| {
            Error::Snapshot(format!(
                "{rel_path} at {} is not valid UTF-8: {err}",
                self.git_ref
            ))
        })
    }

    fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>> {
        // Git object paths always use forward slashes.
        let git_object = format!("{}:{}", self.git_ref, rel_path.replace('\\', "/"));
        let output = Command::new("git")
            .args(["show", &git_object])
            .current_dir(&self.repo_root)
            .output()
            .map_err(|err| Error::Snapshot(format!("failed to run git show: {err}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Snapshot(format!(
                "failed to read {rel_path} from git ref {}: {}",
                self.git_ref,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    fn exists(&self, rel_path: &str) -> bool {
        self.read_bytes(rel_path).is_ok()
    }
}

/// Pick the snapshot implementation for an optional git ref.
pub fn create_snapshot(repo_root: &Path, git_ref: Option<&str>) -> Box<dyn Snapshot> {
    match git_ref {
        Some(git_ref) => Box::new(GitRefSnapshot::new(
            repo_root.to_path_buf(),
            git_ref.to_string(),
        )),
        None => Box::new(WorkingTreeSnapshot::new(repo_root.to_path_buf())),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn working_tree_reads_text_and_bytes() {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("n8n/scripts")).expect("create dirs");
        std::fs::write(dir.path().join("n8n/scripts/a.py"), "print('hi')\n").expect("write file");

        let snapshot = WorkingTreeSnapshot::new(dir.path().to_path_buf());
        assert!(snapshot.exists("n8n/scripts/a.py"));
        assert_eq!(
            snapshot.read_text("n8n/scripts/a.py").unwrap(),
            "print('hi')\n"
        );
        assert_eq!(
            snapshot.read_bytes("n8n/scripts/a.py").unwrap(),
            b"print('hi')\n"
        );
    }

    #[test]
    fn working_tree_missing_file_is_snapshot_error() {
        let dir = TempDir::new().expect("create temp dir");
        let snapshot = WorkingTreeSnapshot::new(dir.path().to_path_buf());
        assert!(!snapshot.exists("nope.txt"));
        let err = snapshot.read_text("nope.txt").unwrap_err();
        assert!(err.to_string().contains("nope.txt"));
    }

    #[test]
    fn create_snapshot_picks_git_ref_when_given() {
        let dir = TempDir::new().expect("create temp dir");
        // A git-ref snapshot over a non-repo directory reports nothing as
        // existing instead of panicking.
        let snapshot = create_snapshot(dir.path(), Some("HEAD"));
        assert!(!snapshot.exists("anything"));
    }
}
