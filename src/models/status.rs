// ABOUTME: Repository status snapshot broadcast to subscribers after every poll

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One local branch ref as seen on the latest poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSnapshot {
    pub name: String,
    pub head_commit: String,
    pub last_commit_at: Option<DateTime<Utc>>,
}

/// Snapshot of the monitored repository.
///
/// `repo_path` is `None` exactly when no repository was detected at the
/// configured root; `branches` is then empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStatus {
    pub repo_path: Option<PathBuf>,
    pub branches: Vec<BranchSnapshot>,
    pub current_branch: Option<String>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
}

impl RepositoryStatus {
    /// Status for a root with no repository.
    pub fn empty() -> Self {
        Self {
            repo_path: None,
            branches: Vec::new(),
            current_branch: None,
            last_fetch_at: None,
            last_updated_at: Utc::now(),
        }
    }

    pub fn is_repository(&self) -> bool {
        self.repo_path.is_some()
    }

    /// Compare the parts that matter to subscribers.
    ///
    /// Timestamps are excluded: `last_updated_at` moves on every poll and a
    /// fetch rewrites `FETCH_HEAD` even when nothing arrived.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.repo_path == other.repo_path
            && self.current_branch == other.current_branch
            && self.branches == other.branches
    }

    pub fn branch(&self, name: &str) -> Option<&BranchSnapshot> {
        self.branches.iter().find(|b| b.name == name)
    }
}
