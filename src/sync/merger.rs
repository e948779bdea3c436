// ABOUTME: Normalizes commit-embedded task data and merges it into local task records
// ABOUTME: Local text wins, commit status wins, new features are appended with fresh display indices

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::store::{SyncError, TaskStore};
use crate::git::introspect::{feature_array, normalize_feature_entry};
use crate::git::{SummaryHeader, TaskDocumentHit, TaskSummary};
use crate::models::{
    first_string, value_as_string, CommitTaskSnapshot, DocumentKind, GitSyncProvenance, TaskRecord,
};

/// Commit-side task data in one of the two shapes the monitor can hand over.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitTaskData {
    /// A summary already produced by commit introspection
    Extracted(TaskSummary),
    /// The foreign task document exactly as parsed from the commit
    Raw(Value),
}

impl CommitTaskData {
    /// Classify an arbitrary JSON value.
    ///
    /// An object carrying all of `status`, `summary` and `features` is an
    /// extracted summary; anything else is treated as a raw document.
    pub fn from_value(value: Value) -> Self {
        let is_extracted = value.as_object().is_some_and(|obj| {
            obj.contains_key("status") && obj.contains_key("summary") && obj.contains_key("features")
        });
        if !is_extracted {
            return Self::Raw(value);
        }

        let summary = value
            .get("summary")
            .and_then(Value::as_object)
            .map(|s| SummaryHeader {
                id: value_as_string(s.get("id")),
                title: value_as_string(s.get("title")),
                status: value_as_string(s.get("status")),
            });
        let features = value.get("features").and_then(Value::as_array).map(|entries| {
            entries
                .iter()
                .map(|e| normalize_feature_entry(e, DocumentKind::Task))
                .collect()
        });

        Self::Extracted(TaskSummary {
            status: value_as_string(value.get("status")),
            summary,
            features,
        })
    }
}

impl From<&TaskDocumentHit> for CommitTaskData {
    fn from(hit: &TaskDocumentHit) -> Self {
        Self::Raw(hit.task_raw.clone())
    }
}

/// Map either commit shape onto [`CommitTaskSnapshot`].
pub fn normalize_commit_task_data(data: &CommitTaskData, kind: DocumentKind) -> CommitTaskSnapshot {
    match data {
        CommitTaskData::Extracted(extracted) => {
            let header = extracted.summary.clone().unwrap_or_default();
            CommitTaskSnapshot {
                task_id: header.id,
                title: header.title,
                description: None,
                status: extracted.status.clone(),
                features: extracted.features.clone().unwrap_or_default(),
            }
        }
        CommitTaskData::Raw(raw) => {
            let Some(obj) = raw.as_object() else {
                return CommitTaskSnapshot::default();
            };
            CommitTaskSnapshot {
                task_id: first_string(obj, &["id", kind.id_key()]),
                title: first_string(obj, &["title", "name"]),
                description: first_string(obj, &["description"]),
                status: first_string(obj, &["status", "state"]),
                features: feature_array(obj, kind)
                    .map(|entries| entries.iter().map(|e| normalize_feature_entry(e, kind)).collect())
                    .unwrap_or_default(),
            }
        }
    }
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub task_status_changed: bool,
    pub updated_features: Vec<String>,
    pub added_features: Vec<String>,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        !self.task_status_changed && self.updated_features.is_empty() && self.added_features.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub updated_task: TaskRecord,
    pub change_summary: ChangeSummary,
}

/// Merge normalized commit data into a copy of `local`.
///
/// Matching is by feature id first, then by case-insensitive title. When a
/// commit feature matches one local feature by id and another by title, the
/// id match wins and the title match is ignored. Commit features with neither
/// an id nor a title can never be matched again, so they are skipped.
pub fn merge_commit_data_into_local(local: &TaskRecord, normalized: &CommitTaskSnapshot) -> MergeResult {
    let mut updated = local.clone();
    let mut changes = ChangeSummary::default();

    if let Some(status) = &normalized.status {
        if updated.status.as_ref() != Some(status) {
            updated.status = Some(status.clone());
            changes.task_status_changed = true;
        }
    }

    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut by_title: HashMap<String, usize> = HashMap::new();
    for (idx, feature) in updated.features.iter().enumerate() {
        if let Some(id) = &feature.id {
            by_id.insert(id.clone(), idx);
        }
        if let Some(key) = title_key(feature.title.as_deref()) {
            by_title.insert(key, idx);
        }
    }

    for incoming in &normalized.features {
        let incoming_title = title_key(incoming.title.as_deref());
        if incoming.id.is_none() && incoming_title.is_none() {
            debug!(status = ?incoming.status, "Skipping commit feature without id or title");
            continue;
        }

        let target = incoming
            .id
            .as_ref()
            .and_then(|id| by_id.get(id))
            .or_else(|| incoming_title.as_ref().and_then(|k| by_title.get(k)))
            .copied();

        let Some(idx) = target else {
            let idx = updated.features.len();
            updated.features.push(incoming.clone());
            if let Some(id) = &incoming.id {
                by_id.insert(id.clone(), idx);
                push_unique(&mut changes.added_features, id);
            }
            if let Some(key) = incoming_title {
                by_title.insert(key, idx);
            }
            continue;
        };

        let existing = &mut updated.features[idx];
        if let Some(status) = &incoming.status {
            if existing.status.as_ref() != Some(status) {
                existing.status = Some(status.clone());
                if let Some(id) = incoming.id.as_ref().or(existing.id.as_ref()) {
                    push_unique(&mut changes.updated_features, id);
                }
            }
        }
        // Local text is authoritative; only fill gaps
        if existing.title_is_empty() {
            if let Some(title) = incoming.title.as_ref().filter(|t| !t.trim().is_empty()) {
                existing.title = Some(title.clone());
                if let Some(key) = title_key(Some(title)) {
                    by_title.insert(key, idx);
                }
            }
        }
        if existing.description_is_empty() {
            if let Some(description) = incoming.description.as_ref().filter(|d| !d.trim().is_empty()) {
                existing.description = Some(description.clone());
            }
        }
    }

    let mut next_index = updated.max_display_index();
    for id in &changes.added_features {
        if !updated.feature_id_to_display_index.contains_key(id) {
            next_index += 1;
            updated.feature_id_to_display_index.insert(id.clone(), next_index);
        }
    }

    MergeResult {
        updated_task: updated,
        change_summary: changes,
    }
}

fn title_key(title: Option<&str>) -> Option<String> {
    title.filter(|t| !t.trim().is_empty()).map(str::to_lowercase)
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_string());
    }
}

/// Where the commit data came from; stamped into `gitSync`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitMeta {
    pub commit: Option<String>,
    pub branch: Option<String>,
    pub task_json_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Overrides the id embedded in the commit data
    pub task_id: Option<String>,
    pub git_meta: Option<GitMeta>,
}

/// Result of a successful sync into a local record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub task_id: String,
    pub path: PathBuf,
    pub changes: ChangeSummary,
    /// False when the merged record was byte-identical and nothing was written
    pub written: bool,
}

/// Applies commit data to records held in a [`TaskStore`].
#[derive(Clone)]
pub struct TaskStateMerger {
    store: Arc<dyn TaskStore>,
    kind: DocumentKind,
}

impl TaskStateMerger {
    pub fn new(store: Arc<dyn TaskStore>, kind: DocumentKind) -> Self {
        Self { store, kind }
    }

    pub const fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Merge commit data into the existing local record and persist it.
    ///
    /// Fails when the record does not exist; records are never created here.
    /// The file is only rewritten when the serialized result differs from
    /// what is on disk.
    pub fn update_local_task_state_from_commit(
        &self,
        data: &CommitTaskData,
        options: &UpdateOptions,
    ) -> Result<SyncReport, SyncError> {
        let normalized = normalize_commit_task_data(data, self.kind);
        let task_id = options
            .task_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| normalized.task_id.clone())
            .ok_or(SyncError::MissingTaskId)?;

        let path = self.store.record_path(&task_id);
        let raw = self
            .store
            .read(&task_id)?
            .ok_or_else(|| SyncError::TaskFileNotFound(path.clone()))?;

        let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
        let local: TaskRecord = serde_json::from_str(content).map_err(|source| SyncError::TaskFileCorrupt {
            path: path.clone(),
            source,
        })?;

        let MergeResult {
            mut updated_task,
            change_summary,
        } = merge_commit_data_into_local(&local, &normalized);

        // Text fills and id-less appends change the record without showing in the summary
        let unchanged = updated_task == local;
        updated_task.git_sync = Some(stamp_provenance(
            local.git_sync.as_ref(),
            options.git_meta.as_ref(),
            unchanged,
        ));

        let mut next = serde_json::to_string_pretty(&updated_task)?;
        next.push('\n');

        let written = next != raw;
        if written {
            self.store.write(&task_id, &next)?;
            info!(
                task_id = %task_id,
                status_changed = change_summary.task_status_changed,
                updated = change_summary.updated_features.len(),
                added = change_summary.added_features.len(),
                "Synced task record from commit"
            );
        } else {
            debug!(task_id = %task_id, "Task record already up to date");
        }

        Ok(SyncReport {
            task_id,
            path,
            changes: change_summary,
            written,
        })
    }
}

/// Build the `gitSync` stamp, keeping the previous timestamp when a re-sync of
/// the same origin changed nothing so the file stays byte-identical.
fn stamp_provenance(
    previous: Option<&GitSyncProvenance>,
    meta: Option<&GitMeta>,
    unchanged: bool,
) -> GitSyncProvenance {
    let meta = meta.cloned().unwrap_or_default();
    let mut stamp = GitSyncProvenance {
        last_synced_at: Some(Utc::now()),
        last_commit: meta.commit,
        last_branch: meta.branch,
        last_task_json_path: meta.task_json_path,
        source: Some(GitSyncProvenance::SOURCE_COMMIT.to_string()),
        extra: previous.map(|p| p.extra.clone()).unwrap_or_else(Map::new),
    };
    if let Some(previous) = previous {
        if unchanged && previous.last_synced_at.is_some() && previous.same_origin(&stamp) {
            stamp.last_synced_at = previous.last_synced_at;
        }
    }
    stamp
}
