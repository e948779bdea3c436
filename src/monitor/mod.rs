// ABOUTME: Repository monitor: poll loop, feature-branch scanning, and the guarded merge workflow
//
// Key components:
// - git_monitor: per-repository coordinator owning the analysis cache and last snapshot
// - merge: step-by-step merge protocol with abort-on-conflict recovery
// - scheduler: repeating timer with start/stop/trigger_now over a single-flight tick
// - service: the operations exposed to callers (status, poll, interval, unmerged, merge)

pub mod git_monitor;
pub mod merge;
pub mod scheduler;
pub mod service;

use thiserror::Error;

use crate::git::GitCommandError;

pub use git_monitor::{GitMonitor, UnmergedReport};
pub use merge::{MergeOutcome, MergePhase};
pub use scheduler::{PollScheduler, DEFAULT_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
pub use service::MonitorService;

/// Errors surfaced by monitor operations. Reads degrade instead of failing, so
/// these come almost entirely from the merge workflow.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("No git repository detected at {0}")]
    RepoNotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Refusing to merge a branch into itself: {0}")]
    SelfMerge(String),
    #[error("Working tree not clean. Commit or stash changes before merging.")]
    DirtyWorkingTree,
    #[error("Branch not found: {0}")]
    BranchNotFound(String),
    #[error("Merge of {branch} into {base} failed and was aborted: {message}")]
    MergeConflict {
        branch: String,
        base: String,
        message: String,
    },
    #[error("Poll interval {0}ms out of range (5000..=600000)")]
    InvalidPollInterval(u64),
    #[error(transparent)]
    Git(#[from] GitCommandError),
}
