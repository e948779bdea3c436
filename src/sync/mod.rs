// ABOUTME: Task-state reconciliation: commit data normalization, three-way merge, and record storage

pub mod merger;
pub mod store;

pub use merger::{
    ChangeSummary, CommitTaskData, GitMeta, MergeResult, SyncReport, TaskStateMerger, UpdateOptions,
    merge_commit_data_into_local, normalize_commit_task_data,
};
pub use store::{FsTaskStore, SyncError, TaskStore};
