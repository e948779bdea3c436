// ABOUTME: Read-only inspection of commits: locate, read and tolerantly parse task documents
// ABOUTME: Uses ls-tree / show against a revision so the working tree is never touched

//! Commit introspection.
//!
//! Nothing in here fails the caller on git trouble. A failed `ls-tree` is an
//! empty file list, a failed `show` is a missing file, and a document that
//! does not parse is skipped. The monitor's scan loop depends on that: one
//! broken branch must not stop the others from being analyzed.

use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::backend::GitBackend;
use crate::models::{first_string, DocumentKind, FeatureRecord};

lazy_static! {
    /// Block comments, including ones spanning lines
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    /// Line comments that start a line or follow whitespace, so `http://` survives
    static ref LINE_COMMENT: Regex = Regex::new(r"(?m)(^|\s)//.*$").unwrap();
}

/// Header fields pulled from a task document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryHeader {
    pub id: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
}

/// Commit-level task summary, tolerant of two foreign schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskSummary {
    pub status: Option<String>,
    pub summary: Option<SummaryHeader>,
    pub features: Option<Vec<FeatureRecord>>,
}

/// Options for locating the document inside a commit tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Basename to look for, e.g. `task.json`
    pub file_name: String,
    /// Directory segment that marks the conventional location, e.g. `tasks`
    pub collection_dir: String,
    kind: DocumentKind,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self::for_kind(DocumentKind::Task)
    }
}

impl AnalyzeOptions {
    pub fn for_kind(kind: DocumentKind) -> Self {
        Self {
            file_name: kind.file_name().to_string(),
            collection_dir: kind.collection_dir().to_string(),
            kind,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub const fn kind(&self) -> DocumentKind {
        self.kind
    }
}

/// The document a commit analysis settled on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocumentHit {
    pub task_json_path: String,
    pub task_raw: Value,
    pub extracted: TaskSummary,
}

/// Outcome of analyzing one commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitAnalysis {
    pub commit: Option<String>,
    pub document: Option<TaskDocumentHit>,
    pub error: Option<String>,
}

impl CommitAnalysis {
    pub const fn found(&self) -> bool {
        self.document.is_some()
    }

    fn not_found(commit: &str) -> Self {
        Self {
            commit: Some(commit.to_string()),
            ..Self::default()
        }
    }

    fn failed(commit: Option<&str>, error: &str) -> Self {
        Self {
            commit: commit.map(ToString::to_string),
            document: None,
            error: Some(error.to_string()),
        }
    }
}

/// Read-only queries against repository history.
#[derive(Clone)]
pub struct GitIntrospector {
    git: Arc<dyn GitBackend>,
}

impl GitIntrospector {
    pub fn new(git: Arc<dyn GitBackend>) -> Self {
        Self { git }
    }

    /// Every tracked path at `revision`; empty on any git failure.
    pub async fn list_files_at_revision(&self, repo: &Path, revision: &str) -> Vec<String> {
        match self.git.list_tree(repo, revision).await {
            Ok(files) => files,
            Err(e) => {
                debug!(revision = %revision, error = %e, "ls-tree failed");
                Vec::new()
            }
        }
    }

    /// Content of `path` at `revision`, or `None` if absent or unreadable.
    pub async fn read_file_at_revision(&self, repo: &Path, revision: &str, path: &str) -> Option<String> {
        match self.git.read_blob(repo, revision, path).await {
            Ok(content) => content,
            Err(e) => {
                debug!(revision = %revision, path = %path, error = %e, "show failed");
                None
            }
        }
    }

    /// Analyze one commit for a task document.
    ///
    /// Candidates are files whose basename matches, ranked by
    /// `2 * root_level + 1 * inside_collection_dir` (descending, stable on the
    /// tree order). The first candidate that reads and parses wins.
    pub async fn analyze_commit_for_task(
        &self,
        repo: &Path,
        commit: &str,
        options: &AnalyzeOptions,
    ) -> CommitAnalysis {
        let files = self.list_files_at_revision(repo, commit).await;
        if files.is_empty() {
            return CommitAnalysis::failed(Some(commit), "No files found at commit");
        }

        let candidates = rank_candidates(&files, options);
        if candidates.is_empty() {
            return CommitAnalysis::not_found(commit);
        }

        for path in candidates {
            let Some(content) = self.read_file_at_revision(repo, commit, path).await else {
                continue;
            };
            let Some(parsed) = parse_task_document(&content) else {
                warn!(commit = %commit, path = %path, "Skipping unparsable task document");
                continue;
            };

            let extracted = extract_task_summary(&parsed, options.kind());
            return CommitAnalysis {
                commit: Some(commit.to_string()),
                document: Some(TaskDocumentHit {
                    task_json_path: path.to_string(),
                    task_raw: parsed,
                    extracted,
                }),
                error: None,
            };
        }

        CommitAnalysis::not_found(commit)
    }

    /// Resolve `branch` to its head commit and analyze that.
    pub async fn analyze_branch_head_for_task(
        &self,
        repo: &Path,
        branch: &str,
        options: &AnalyzeOptions,
    ) -> CommitAnalysis {
        let head = match self.git.resolve_ref(repo, branch).await {
            Ok(Some(sha)) => sha,
            Ok(None) => return CommitAnalysis::failed(None, "Unable to resolve branch head"),
            Err(e) => {
                debug!(branch = %branch, error = %e, "rev-parse failed");
                return CommitAnalysis::failed(None, "Unable to resolve branch head");
            }
        };
        self.analyze_commit_for_task(repo, &head, options).await
    }
}

/// Matching candidate paths, best first.
pub fn rank_candidates<'a>(files: &'a [String], options: &AnalyzeOptions) -> Vec<&'a str> {
    let root_segment = format!("{}/", options.collection_dir);
    let inner_segment = format!("/{}/", options.collection_dir);
    let score = |p: &str| -> u8 {
        let root_level = u8::from(!p.contains('/'));
        let in_collection = u8::from(p.starts_with(&root_segment) || p.contains(&inner_segment));
        2 * root_level + in_collection
    };

    let mut candidates: Vec<&str> = files
        .iter()
        .map(String::as_str)
        .filter(|p| p.rsplit('/').next() == Some(options.file_name.as_str()))
        .collect();
    // sort_by is stable, so equal scores keep tree order
    candidates.sort_by(|a, b| score(b).cmp(&score(a)));
    candidates
}

/// Parse a hand-edited JSON document.
///
/// Strips a leading byte-order mark and `//` / `/* */` comments first. Only
/// JSON objects count as task documents.
pub fn parse_task_document(content: &str) -> Option<Value> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let without_blocks = BLOCK_COMMENT.replace_all(content, "");
    let cleaned = LINE_COMMENT.replace_all(&without_blocks, "$1");
    serde_json::from_str::<Value>(&cleaned)
        .ok()
        .filter(Value::is_object)
}

/// Pull status, header and features out of a parsed document.
///
/// Features come from `features` or the kind's collection key (`tasks`);
/// each entry's id from `id`/`featureId`, status from `status`/`state`.
pub fn extract_task_summary(parsed: &Value, kind: DocumentKind) -> TaskSummary {
    let Some(obj) = parsed.as_object() else {
        return TaskSummary::default();
    };

    let status = first_string(obj, &["status", "state"]);
    let features = feature_array(obj, kind).map(|entries| {
        entries
            .iter()
            .map(|entry| normalize_feature_entry(entry, kind))
            .collect()
    });

    TaskSummary {
        status: status.clone(),
        summary: Some(SummaryHeader {
            id: first_string(obj, &["id", kind.id_key()]),
            title: first_string(obj, &["title", "name"]),
            status,
        }),
        features,
    }
}

/// The feature list under `features`, falling back to the collection key.
pub(crate) fn feature_array(obj: &Map<String, Value>, kind: DocumentKind) -> Option<&Vec<Value>> {
    obj.get("features")
        .and_then(Value::as_array)
        .or_else(|| obj.get(kind.collection_dir()).and_then(Value::as_array))
}

/// Map one foreign feature entry onto [`FeatureRecord`]. Non-objects yield an empty record.
pub(crate) fn normalize_feature_entry(entry: &Value, kind: DocumentKind) -> FeatureRecord {
    let Some(f) = entry.as_object() else {
        return FeatureRecord::default();
    };
    FeatureRecord {
        id: first_string(f, &["id", "featureId", kind.id_key()]),
        title: first_string(f, &["title"]),
        description: first_string(f, &["description"]),
        status: first_string(f, &["status", "state"]),
        extra: Map::new(),
    }
}
