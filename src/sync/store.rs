// ABOUTME: Task record store: reads and rewrites <root>/<collection>/<id>/<file> JSON documents
// ABOUTME: Never creates records; a missing file is reported to the caller instead

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::DocumentKind;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unable to determine task id from commit data or options")]
    MissingTaskId,
    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),
    #[error("Local task file not found: {0}")]
    TaskFileNotFound(PathBuf),
    #[error("Local task file is invalid JSON: {path}: {source}")]
    TaskFileCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize task record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistence for task records, addressed by task id.
#[cfg_attr(test, mockall::automock)]
pub trait TaskStore: Send + Sync {
    /// Where the record for `task_id` lives (whether or not it exists).
    fn record_path(&self, task_id: &str) -> PathBuf;

    /// Raw file content, or `None` when the record does not exist.
    fn read(&self, task_id: &str) -> Result<Option<String>, SyncError>;

    /// Replace the record's content.
    fn write(&self, task_id: &str, content: &str) -> Result<(), SyncError>;
}

/// [`TaskStore`] over the project directory.
#[derive(Debug, Clone)]
pub struct FsTaskStore {
    root: PathBuf,
    kind: DocumentKind,
}

impl FsTaskStore {
    pub fn new(root: impl Into<PathBuf>, kind: DocumentKind) -> Self {
        Self {
            root: root.into(),
            kind,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn checked_path(&self, task_id: &str) -> Result<PathBuf, SyncError> {
        validate_task_id(task_id)?;
        Ok(self.record_path(task_id))
    }
}

impl TaskStore for FsTaskStore {
    fn record_path(&self, task_id: &str) -> PathBuf {
        self.root
            .join(self.kind.collection_dir())
            .join(task_id)
            .join(self.kind.file_name())
    }

    fn read(&self, task_id: &str) -> Result<Option<String>, SyncError> {
        let path = self.checked_path(task_id)?;
        if !path.is_file() {
            debug!(path = %path.display(), "Task record does not exist");
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| SyncError::Io { path, source })
    }

    fn write(&self, task_id: &str, content: &str) -> Result<(), SyncError> {
        let path = self.checked_path(task_id)?;
        fs::write(&path, content).map_err(|source| SyncError::Io { path, source })
    }
}

/// Task ids become path segments; refuse anything that escapes the collection.
fn validate_task_id(task_id: &str) -> Result<(), SyncError> {
    let path = Path::new(task_id);
    let escapes = task_id.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(SyncError::InvalidTaskId(task_id.to_string()));
    }
    Ok(())
}
