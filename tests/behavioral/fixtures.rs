// ABOUTME: Shared test fixtures and utilities for behavioral tests
//
// Provides:
// - TestRepo: Temporary git repository for testing
// - git_available(): Check if git is installed
// - require_git!(): Skip test if git unavailable

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Creates a temporary git repository with initial commit on `main`
pub struct TestRepo {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestRepo {
    /// Create a new temporary git repository with initial commit
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().to_path_buf();
        let repo = Self { dir, path };

        repo.git(&["init"])?;
        // Independent of the host's init.defaultBranch
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;

        // Configure git user for commits
        repo.git(&["config", "user.email", "test@test.com"])?;
        repo.git(&["config", "user.name", "Test User"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;

        repo.add_commit("README.md", "# Test Repo\n", "Initial commit")?;

        Ok(repo)
    }

    /// Get the path to the repository
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run git in the repository and return trimmed stdout
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git").args(args).current_dir(&self.path).output()?;
        if !output.status.success() {
            anyhow::bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    /// Write a file (creating parent directories) without committing it
    pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Add a file and commit it
    pub fn add_commit(&self, relative: &str, content: &str, message: &str) -> Result<String> {
        self.write_file(relative, content)?;
        self.git(&["add", relative])?;
        self.git(&["commit", "-m", message])?;
        self.head_sha("HEAD")
    }

    /// Full SHA a revision points at
    pub fn head_sha(&self, rev: &str) -> Result<String> {
        self.git(&["rev-parse", rev])
    }

    /// Get current branch name
    pub fn current_branch(&self) -> Result<String> {
        self.git(&["branch", "--show-current"])
    }

    /// Create and checkout a new branch
    pub fn create_branch(&self, branch_name: &str) -> Result<()> {
        self.git(&["checkout", "-b", branch_name]).map(|_| ())
    }

    /// Checkout an existing branch
    pub fn checkout(&self, branch_name: &str) -> Result<()> {
        self.git(&["checkout", branch_name]).map(|_| ())
    }

    /// Porcelain status output; empty when clean
    pub fn porcelain(&self) -> Result<String> {
        self.git(&["status", "--porcelain"])
    }
}

/// Check if git is available on the system
pub fn git_available() -> bool {
    which::which("git").is_ok()
}

/// Macro to skip test if git is not available
#[macro_export]
macro_rules! require_git {
    () => {
        if !$crate::fixtures::git_available() {
            eprintln!("Skipping test: git not available");
            return Ok(());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_creation() -> Result<()> {
        require_git!();
        let repo = TestRepo::new()?;
        assert!(repo.path().join(".git").exists());
        assert_eq!(repo.current_branch()?, "main");
        assert!(repo.porcelain()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_nested_commit() -> Result<()> {
        require_git!();
        let repo = TestRepo::new()?;
        let sha = repo.add_commit("tasks/1/task.json", "{}", "Add task")?;
        assert_eq!(sha, repo.head_sha("main")?);
        assert!(repo.path().join("tasks/1/task.json").exists());
        Ok(())
    }
}
