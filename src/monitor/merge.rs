// ABOUTME: Guarded merge of a feature branch into its base, with abort-on-failure recovery
// ABOUTME: Publishes each protocol phase on a watch channel so callers can observe progress

use std::path::Path;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::MonitorError;
use crate::git::GitBackend;

/// Merge protocol phases.
///
/// A run always ends in `Done` or `Failed`; `Aborting` is only entered after
/// the merge itself has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    #[default]
    Idle,
    Fetching,
    CheckingCleanliness,
    CheckingOutBase,
    PullingBase,
    ComputingDelta,
    Merging,
    Done,
    Aborting,
    Failed,
}

impl MergePhase {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Result of a merge run that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub merged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub base: String,
    pub branch: String,
    /// New base head after a merge commit was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

pub const NO_COMMITS_TO_MERGE: &str = "No commits to merge";

/// One execution of the merge protocol against a repository.
///
/// The caller must hold exclusive access to the working tree for the
/// duration of [`MergeWorkflow::run`].
pub(crate) struct MergeWorkflow<'a> {
    git: &'a dyn GitBackend,
    repo: &'a Path,
    phase: &'a watch::Sender<MergePhase>,
}

impl<'a> MergeWorkflow<'a> {
    pub(crate) fn new(git: &'a dyn GitBackend, repo: &'a Path, phase: &'a watch::Sender<MergePhase>) -> Self {
        Self { git, repo, phase }
    }

    fn enter(&self, phase: MergePhase) {
        debug!(phase = ?phase, "Merge phase");
        self.phase.send_replace(phase);
    }

    pub(crate) async fn run(&self, branch: &str, base: Option<&str>) -> Result<MergeOutcome, MonitorError> {
        let result = self.execute(branch, base).await;
        self.enter(if result.is_ok() { MergePhase::Done } else { MergePhase::Failed });
        result
    }

    async fn execute(&self, branch: &str, base: Option<&str>) -> Result<MergeOutcome, MonitorError> {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(MonitorError::InvalidArgument("branch must not be empty".to_string()));
        }

        self.enter(MergePhase::Fetching);
        if let Err(e) = self.git.fetch_all(self.repo).await {
            warn!(error = %e, "Fetch before merge failed, continuing with local refs");
        }

        let base = match base.map(str::trim).filter(|b| !b.is_empty()) {
            Some(b) => b.to_string(),
            None => self.git.current_branch(self.repo).await?,
        };
        if base == branch {
            return Err(MonitorError::SelfMerge(branch.to_string()));
        }

        // Preconditions run before anything touches the working tree.
        self.enter(MergePhase::CheckingCleanliness);
        let porcelain = self.git.porcelain_status(self.repo).await?;
        if !porcelain.trim().is_empty() {
            return Err(MonitorError::DirtyWorkingTree);
        }
        if self.git.resolve_ref(self.repo, branch).await?.is_none() {
            return Err(MonitorError::BranchNotFound(branch.to_string()));
        }

        self.enter(MergePhase::CheckingOutBase);
        self.git.checkout(self.repo, &base).await?;

        self.enter(MergePhase::PullingBase);
        match self.git.upstream_of(self.repo, &base).await? {
            Some(upstream) => {
                debug!(base = %base, upstream = %upstream, "Fast-forwarding base");
                self.git.pull_ff_only(self.repo).await?;
            }
            None => debug!(base = %base, "Base has no upstream, skipping pull"),
        }

        self.enter(MergePhase::ComputingDelta);
        let ahead = self.git.count_commits_ahead(self.repo, &base, branch).await?;
        if ahead == 0 {
            info!(branch = %branch, base = %base, "Nothing to merge");
            return Ok(MergeOutcome {
                merged: false,
                reason: Some(NO_COMMITS_TO_MERGE.to_string()),
                base,
                branch: branch.to_string(),
                commit: None,
            });
        }

        self.enter(MergePhase::Merging);
        if let Err(e) = self.git.merge_no_ff(self.repo, branch).await {
            self.enter(MergePhase::Aborting);
            if let Err(abort_err) = self.git.merge_abort(self.repo).await {
                warn!(error = %abort_err, "git merge --abort failed");
            }
            warn!(branch = %branch, base = %base, error = %e, "Merge failed and was aborted");
            return Err(MonitorError::MergeConflict {
                branch: branch.to_string(),
                base,
                message: e.to_string(),
            });
        }

        let commit = self.git.resolve_ref(self.repo, "HEAD").await.ok().flatten();
        info!(branch = %branch, base = %base, ahead, commit = ?commit, "Merged branch into base");
        Ok(MergeOutcome {
            merged: true,
            reason: None,
            base,
            branch: branch.to_string(),
            commit,
        })
    }
}
