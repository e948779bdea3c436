// ABOUTME: Core data models for repository status snapshots and persisted task records

pub mod status;
pub mod task;

pub use status::{BranchSnapshot, RepositoryStatus};
pub use task::{
    CommitTaskSnapshot, DocumentKind, FeatureRecord, GitSyncProvenance, TaskRecord,
    first_string, value_as_string,
};
