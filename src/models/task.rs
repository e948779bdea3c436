// ABOUTME: Task record data model persisted as JSON, plus the normalized commit-side snapshot
// ABOUTME: Unknown fields on tasks and features are carried through untouched via flattened maps

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Which family of documents a repository tracks.
///
/// Tasks and stories share one pipeline; they differ only in file names,
/// directory conventions and the alternate keys foreign documents use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Task,
    Story,
}

impl DocumentKind {
    /// File name of the document inside a commit and on disk.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Task => "task.json",
            Self::Story => "story.json",
        }
    }

    /// Directory that groups documents of this kind (`tasks`, `stories`).
    pub const fn collection_dir(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Story => "stories",
        }
    }

    /// Alternate key for the document id (`taskId`, `storyId`).
    pub const fn id_key(self) -> &'static str {
        match self {
            Self::Task => "taskId",
            Self::Story => "storyId",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Story => write!(f, "story"),
        }
    }
}

/// A single feature inside a task record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Fields this subsystem does not model (acceptance, blockers, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: Some(title.into()),
            description: None,
            status: Some(status.into()),
            extra: Map::new(),
        }
    }

    /// True when the title is absent or blank.
    pub fn title_is_empty(&self) -> bool {
        self.title.as_deref().map_or(true, |t| t.trim().is_empty())
    }

    /// True when the description is absent or blank.
    pub fn description_is_empty(&self) -> bool {
        self.description.as_deref().map_or(true, |d| d.trim().is_empty())
    }
}

/// Provenance stamped on a record after a successful commit sync.
///
/// Informational only; nothing reads it back to make decisions except the
/// write-idempotence check, which compares it field by field. Local files may
/// carry any `gitSync` object, so every field is optional and unparseable
/// values are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSyncProvenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_commit: Option<String>,
    pub last_branch: Option<String>,
    pub last_task_json_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GitSyncProvenance {
    pub const SOURCE_COMMIT: &'static str = "commit";

    /// Read whatever a local file holds under `gitSync`.
    ///
    /// Known keys are taken when they have the expected shape; everything
    /// else, including malformed known keys, stays in `extra`.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let last_synced_at = map
            .get("lastSyncedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));
        if last_synced_at.is_some() {
            map.remove("lastSyncedAt");
        }

        let mut take = |key: &str| {
            if matches!(map.get(key), Some(Value::String(_) | Value::Null)) {
                map.remove(key).and_then(|v| v.as_str().map(String::from))
            } else {
                None
            }
        };
        let last_commit = take("lastCommit");
        let last_branch = take("lastBranch");
        let last_task_json_path = take("lastTaskJsonPath");
        let source = take("source");

        Self {
            last_synced_at,
            last_commit,
            last_branch,
            last_task_json_path,
            source,
            extra: map,
        }
    }

    /// Whether two provenance stamps point at the same commit origin.
    pub fn same_origin(&self, other: &Self) -> bool {
        self.last_commit == other.last_commit
            && self.last_branch == other.last_branch
            && self.last_task_json_path == other.last_task_json_path
            && self.source == other.source
    }
}

/// Locally persisted task record (`tasks/<id>/task.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Vec<FeatureRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub feature_id_to_display_index: BTreeMap<String, u32>,
    #[serde(default, deserialize_with = "lenient_git_sync", skip_serializing_if = "Option::is_none")]
    pub git_sync: Option<GitSyncProvenance>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskRecord {
    /// Highest display index currently assigned, or 0 when none are.
    pub fn max_display_index(&self) -> u32 {
        self.feature_id_to_display_index.values().copied().max().unwrap_or(0)
    }
}

/// Canonical shape of commit-embedded task data after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitTaskSnapshot {
    pub task_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub features: Vec<FeatureRecord>,
}

/// Read a loosely-typed JSON scalar as a string.
///
/// Foreign documents use both `"42"` and `42` for ids; anything else
/// (null, objects, arrays, empty strings) counts as absent.
pub fn value_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First present key among `keys`, read with [`value_as_string`].
pub fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| value_as_string(obj.get(*k)))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value_as_string(value.as_ref()))
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Non-object values carry no provenance and are dropped; the next sync restamps.
fn lenient_git_sync<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<GitSyncProvenance>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => Ok(Some(GitSyncProvenance::from_map(map))),
        _ => Ok(None),
    }
}
