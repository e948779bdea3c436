// ABOUTME: Per-repository coordinator: status snapshots, feature-branch scanning, and merges
// ABOUTME: Owns the analysis cache and last snapshot behind one lock so ticks never overlap

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use super::merge::{MergeOutcome, MergePhase, MergeWorkflow};
use super::MonitorError;
use crate::config::MonitorConfig;
use crate::git::{AnalyzeOptions, BranchNamingConvention, CliGit, CommitAnalysis, GitBackend, GitIntrospector};
use crate::models::{BranchSnapshot, DocumentKind, RepositoryStatus};
use crate::sync::{CommitTaskData, FsTaskStore, GitMeta, TaskStateMerger, TaskStore, UpdateOptions};

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Answer to "does `branch` carry commits `base` lacks?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmergedReport {
    pub has_unmerged: bool,
    pub ahead_count: u64,
    pub base: String,
    pub branch: String,
    /// The branch does not exist locally
    pub not_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// State shared by ticks and merges.
#[derive(Debug, Default)]
struct MonitorState {
    /// branch name -> last analyzed head commit
    analysis_cache: HashMap<String, String>,
    last_snapshot: Option<RepositoryStatus>,
}

pub struct GitMonitor {
    project_root: PathBuf,
    git: Arc<dyn GitBackend>,
    introspector: GitIntrospector,
    merger: TaskStateMerger,
    naming: BranchNamingConvention,
    analyze_options: AnalyzeOptions,
    state: Mutex<MonitorState>,
    updates: broadcast::Sender<RepositoryStatus>,
    phase: watch::Sender<MergePhase>,
}

impl GitMonitor {
    pub fn new(
        project_root: impl Into<PathBuf>,
        git: Arc<dyn GitBackend>,
        store: Arc<dyn TaskStore>,
        naming: BranchNamingConvention,
        kind: DocumentKind,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (phase, _) = watch::channel(MergePhase::Idle);
        Self {
            project_root: project_root.into(),
            introspector: GitIntrospector::new(Arc::clone(&git)),
            git,
            merger: TaskStateMerger::new(store, kind),
            naming,
            analyze_options: AnalyzeOptions::for_kind(kind),
            state: Mutex::new(MonitorState::default()),
            updates,
            phase,
        }
    }

    /// Monitor backed by the `git` binary and task files under `project_root`.
    pub fn from_config(project_root: impl Into<PathBuf>, config: &MonitorConfig) -> Self {
        let project_root = project_root.into();
        let git = Arc::new(CliGit::new(config.read_timeout(), config.write_timeout()));
        let store = Arc::new(FsTaskStore::new(project_root.clone(), config.document));
        Self::new(
            project_root,
            git,
            store,
            BranchNamingConvention::new(config.branch_prefix.clone()),
            config.document,
        )
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub const fn naming(&self) -> &BranchNamingConvention {
        &self.naming
    }

    /// The root, if it holds a `.git` directory (or worktree `.git` file).
    pub fn repo_path(&self) -> Option<PathBuf> {
        self.project_root
            .join(".git")
            .exists()
            .then(|| self.project_root.clone())
    }

    fn require_repo(&self) -> Result<PathBuf, MonitorError> {
        self.repo_path()
            .ok_or_else(|| MonitorError::RepoNotFound(self.project_root.display().to_string()))
    }

    /// Compute a fresh status. Never fails: without a repository the result
    /// is empty, and git failures leave the affected fields empty.
    pub async fn get_status(&self) -> RepositoryStatus {
        let Some(repo) = self.repo_path() else {
            debug!(root = %self.project_root.display(), "No repository at root");
            return RepositoryStatus::empty();
        };

        if let Err(e) = self.git.fetch_all(&repo).await {
            debug!(error = %e, "Fetch failed, using local refs");
        }

        let current_branch = match self.git.current_branch(&repo).await {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(error = %e, "Unable to read current branch");
                None
            }
        };

        let branches = match self.git.list_local_branches(&repo).await {
            Ok(branches) => branches,
            Err(e) => {
                warn!(error = %e, "Unable to list branches");
                Vec::new()
            }
        };

        RepositoryStatus {
            last_fetch_at: self.git.last_fetch_at(&repo),
            repo_path: Some(repo),
            branches,
            current_branch,
            last_updated_at: Utc::now(),
        }
    }

    /// Run one poll: refresh status, sync any feature branch whose head moved,
    /// and broadcast the snapshot if it changed. Concurrent callers queue on
    /// the state lock, so at most one tick runs at a time.
    pub async fn tick(&self) -> RepositoryStatus {
        let mut state = self.state.lock().await;
        self.tick_locked(&mut state).await
    }

    async fn tick_locked(&self, state: &mut MonitorState) -> RepositoryStatus {
        let status = self.get_status().await;

        if let Some(repo) = status.repo_path.as_deref() {
            for branch in &status.branches {
                if !self.naming.is_feature_branch_name(&branch.name) {
                    continue;
                }
                if state.analysis_cache.get(&branch.name) == Some(&branch.head_commit) {
                    continue;
                }

                let analyzed = self.scan_branch(repo, branch).await;
                // Cached whether or not anything was found, so a bad commit
                // is not re-read every poll.
                state
                    .analysis_cache
                    .insert(branch.name.clone(), analyzed.unwrap_or_else(|| branch.head_commit.clone()));
            }
        }

        let changed = state
            .last_snapshot
            .as_ref()
            .map_or(true, |previous| !previous.structurally_eq(&status));
        state.last_snapshot = Some(status.clone());

        if changed {
            debug!(branches = status.branches.len(), "Repository status changed");
            // No receivers is fine.
            let _ = self.updates.send(status.clone());
        }

        status
    }

    /// Analyze one feature branch head and sync its task record. Errors stay
    /// inside this branch. Returns the commit that was analyzed.
    async fn scan_branch(&self, repo: &Path, branch: &BranchSnapshot) -> Option<String> {
        let analysis = self
            .introspector
            .analyze_branch_head_for_task(repo, &branch.name, &self.analyze_options)
            .await;
        let commit = analysis.commit.clone();

        let Some(hit) = analysis.document else {
            match analysis.error {
                Some(error) => warn!(branch = %branch.name, error = %error, "Branch analysis failed"),
                None => debug!(branch = %branch.name, "No task document at branch head"),
            }
            return commit;
        };

        let task_id = self.naming.branch_name_to_task_id(&branch.name).or_else(|| {
            hit.extracted
                .summary
                .as_ref()
                .and_then(|s| s.id.clone())
        });

        let options = UpdateOptions {
            task_id,
            git_meta: Some(GitMeta {
                commit: commit.clone(),
                branch: Some(branch.name.clone()),
                task_json_path: Some(hit.task_json_path.clone()),
            }),
        };

        match self
            .merger
            .update_local_task_state_from_commit(&CommitTaskData::from(&hit), &options)
        {
            Ok(report) if report.written => info!(
                branch = %branch.name,
                task_id = %report.task_id,
                path = %report.path.display(),
                "Task record updated from branch"
            ),
            Ok(report) => debug!(branch = %branch.name, task_id = %report.task_id, "Task record unchanged"),
            Err(e) => warn!(branch = %branch.name, error = %e, "Task sync failed"),
        }

        commit
    }

    /// Count commits on `branch` that `base` (default: current branch) lacks.
    ///
    /// Git failures degrade to `has_unmerged: false` with a reason.
    pub async fn has_unmerged_commits(&self, branch: &str, base: Option<&str>) -> Result<UnmergedReport, MonitorError> {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(MonitorError::InvalidArgument("branch must not be empty".to_string()));
        }
        let repo = self.require_repo()?;

        if let Err(e) = self.git.fetch_all(&repo).await {
            debug!(error = %e, "Fetch failed, using local refs");
        }

        let base = match base.map(str::trim).filter(|b| !b.is_empty()) {
            Some(b) => b.to_string(),
            None => self.git.current_branch(&repo).await?,
        };

        let mut report = UnmergedReport {
            has_unmerged: false,
            ahead_count: 0,
            base,
            branch: branch.to_string(),
            not_found: false,
            reason: None,
        };

        if report.base == report.branch {
            report.reason = Some("base equals branch".to_string());
            return Ok(report);
        }

        match self.git.resolve_ref(&repo, branch).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                report.not_found = true;
                report.reason = Some("branch not found".to_string());
                return Ok(report);
            }
            Err(e) => {
                report.reason = Some(e.to_string());
                return Ok(report);
            }
        }

        match self.git.count_commits_ahead(&repo, &report.base, branch).await {
            Ok(ahead) => {
                report.ahead_count = ahead;
                report.has_unmerged = ahead > 0;
            }
            Err(e) => {
                warn!(branch = %branch, base = %report.base, error = %e, "Unable to count unmerged commits");
                report.reason = Some(e.to_string());
            }
        }

        Ok(report)
    }

    /// Merge `branch` into `base` (default: current branch).
    ///
    /// Holds the state lock for the whole protocol, so no tick observes a
    /// half-merged tree. A successful merge is followed by a refresh.
    pub async fn merge_branch_into_base(&self, branch: &str, base: Option<&str>) -> Result<MergeOutcome, MonitorError> {
        let repo = self.require_repo()?;
        let mut state = self.state.lock().await;

        let outcome = MergeWorkflow::new(self.git.as_ref(), &repo, &self.phase)
            .run(branch, base)
            .await?;

        if outcome.merged {
            self.tick_locked(&mut state).await;
        }
        Ok(outcome)
    }

    /// Analyze the head of an arbitrary branch without syncing anything.
    pub async fn analyze_branch(&self, branch: &str) -> Result<CommitAnalysis, MonitorError> {
        let repo = self.require_repo()?;
        Ok(self
            .introspector
            .analyze_branch_head_for_task(&repo, branch, &self.analyze_options)
            .await)
    }

    /// Status from the most recent tick, if any.
    pub async fn last_snapshot(&self) -> Option<RepositoryStatus> {
        self.state.lock().await.last_snapshot.clone()
    }

    /// Commit last analyzed for `branch`.
    pub async fn cached_head(&self, branch: &str) -> Option<String> {
        self.state.lock().await.analysis_cache.get(branch).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryStatus> {
        self.updates.subscribe()
    }

    pub fn merge_phase(&self) -> watch::Receiver<MergePhase> {
        self.phase.subscribe()
    }

    /// Wait until no tick or merge is in flight.
    pub async fn quiesce(&self) {
        drop(self.state.lock().await);
    }
}
