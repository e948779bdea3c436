// ABOUTME: Git integration: subprocess backend, read-only commit introspection, and branch naming

pub mod backend;
pub mod introspect;
pub mod naming;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{CliGit, GitBackend, GitCommandError};
pub use introspect::{
    AnalyzeOptions, CommitAnalysis, GitIntrospector, SummaryHeader, TaskDocumentHit, TaskSummary,
    extract_task_summary, parse_task_document,
};
pub use naming::{BranchNamingConvention, NamingError, DEFAULT_FEATURE_BRANCH_PREFIX};
