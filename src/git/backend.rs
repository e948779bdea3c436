// ABOUTME: Narrow capability interface over the git CLI, plus the subprocess implementation
// ABOUTME: Every call is async and bounded by a timeout so a hung git cannot stall the monitor

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::models::BranchSnapshot;

/// Separator used in `for-each-ref` output; never valid in a ref name.
const FIELD_SEPARATOR: &str = ":::";

#[derive(Error, Debug)]
pub enum GitCommandError {
    #[error("Failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("git {args} timed out after {after:?}")]
    Timeout { args: String, after: Duration },
    #[error("git {args} failed (exit {code:?}): {stderr}")]
    Failed {
        args: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// The git operations the reconciliation subsystem needs, and nothing more.
///
/// Read-only calls (`fetch_all` through `porcelain_status`) are expected to be
/// fast; mutating calls (`checkout` through `merge_abort`) touch the working
/// tree and get a longer budget.
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// `git fetch --all --prune`
    async fn fetch_all(&self, repo: &Path) -> Result<(), GitCommandError>;

    /// Short name of the checked-out branch (`HEAD` when detached).
    async fn current_branch(&self, repo: &Path) -> Result<String, GitCommandError>;

    /// Every ref under `refs/heads/` with its head SHA and committer date.
    async fn list_local_branches(&self, repo: &Path) -> Result<Vec<BranchSnapshot>, GitCommandError>;

    /// Resolve a revision to a full SHA; `None` when it does not exist.
    async fn resolve_ref(&self, repo: &Path, rev: &str) -> Result<Option<String>, GitCommandError>;

    /// Upstream tracking ref of a local branch, if one is configured.
    async fn upstream_of(&self, repo: &Path, branch: &str) -> Result<Option<String>, GitCommandError>;

    /// Every tracked path at `rev`, without checking it out.
    async fn list_tree(&self, repo: &Path, rev: &str) -> Result<Vec<String>, GitCommandError>;

    /// Content of `path` at `rev`; `None` when the path is absent or empty.
    async fn read_blob(&self, repo: &Path, rev: &str, path: &str) -> Result<Option<String>, GitCommandError>;

    /// Number of commits reachable from `branch` but not from `base`.
    async fn count_commits_ahead(&self, repo: &Path, base: &str, branch: &str) -> Result<u64, GitCommandError>;

    /// Raw `git status --porcelain` output; empty means clean.
    async fn porcelain_status(&self, repo: &Path) -> Result<String, GitCommandError>;

    async fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitCommandError>;

    /// `git pull --ff-only`; fails on divergence instead of merging.
    async fn pull_ff_only(&self, repo: &Path) -> Result<(), GitCommandError>;

    /// `git merge --no-ff --no-edit <branch>`
    async fn merge_no_ff(&self, repo: &Path, branch: &str) -> Result<(), GitCommandError>;

    async fn merge_abort(&self, repo: &Path) -> Result<(), GitCommandError>;

    /// Modification time of `.git/FETCH_HEAD`, if any fetch has happened.
    fn last_fetch_at(&self, repo: &Path) -> Option<DateTime<Utc>>;
}

/// [`GitBackend`] that shells out to the `git` binary.
#[derive(Debug, Clone)]
pub struct CliGit {
    read_timeout: Duration,
    write_timeout: Duration,
}

impl Default for CliGit {
    fn default() -> Self {
        Self::new(Duration::from_secs(20), Duration::from_secs(60))
    }
}

impl CliGit {
    pub const fn new(read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            read_timeout,
            write_timeout,
        }
    }

    async fn run(&self, repo: &Path, args: &[&str], timeout: Duration) -> Result<String, GitCommandError> {
        let joined = args.join(" ");
        debug!(repo = %repo.display(), args = %joined, "Running git");

        let child = Command::new("git")
            .args(args)
            .current_dir(repo)
            .env("GIT_TERMINAL_PROMPT", "0") // Disable interactive prompts
            .env("GIT_ASKPASS", "echo") // Provide dummy askpass to avoid hanging
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(GitCommandError::Timeout {
                    args: joined,
                    after: timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(GitCommandError::Failed {
                args: joined,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn read(&self, repo: &Path, args: &[&str]) -> Result<String, GitCommandError> {
        self.run(repo, args, self.read_timeout).await
    }

    async fn write(&self, repo: &Path, args: &[&str]) -> Result<String, GitCommandError> {
        self.run(repo, args, self.write_timeout).await
    }
}

#[async_trait]
impl GitBackend for CliGit {
    async fn fetch_all(&self, repo: &Path) -> Result<(), GitCommandError> {
        self.read(repo, &["fetch", "--all", "--prune"]).await.map(|_| ())
    }

    async fn current_branch(&self, repo: &Path) -> Result<String, GitCommandError> {
        let out = self.read(repo, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    async fn list_local_branches(&self, repo: &Path) -> Result<Vec<BranchSnapshot>, GitCommandError> {
        let format = format!(
            "--format=%(refname:short){FIELD_SEPARATOR}%(objectname){FIELD_SEPARATOR}%(committerdate:iso8601-strict)"
        );
        let out = self.read(repo, &["for-each-ref", &format, "refs/heads/"]).await?;
        Ok(parse_branch_listing(&out))
    }

    async fn resolve_ref(&self, repo: &Path, rev: &str) -> Result<Option<String>, GitCommandError> {
        let revspec = format!("{rev}^{{commit}}");
        match self.read(repo, &["rev-parse", "--verify", "--quiet", &revspec]).await {
            Ok(out) => Ok(Some(out.trim().to_string()).filter(|s| !s.is_empty())),
            // --quiet exits 1 with no output when the ref is unknown
            Err(GitCommandError::Failed { code: Some(1), .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn upstream_of(&self, repo: &Path, branch: &str) -> Result<Option<String>, GitCommandError> {
        let revspec = format!("{branch}@{{upstream}}");
        match self.read(repo, &["rev-parse", "--abbrev-ref", "--symbolic-full-name", &revspec]).await {
            Ok(out) => Ok(Some(out.trim().to_string()).filter(|s| !s.is_empty())),
            Err(GitCommandError::Failed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_tree(&self, repo: &Path, rev: &str) -> Result<Vec<String>, GitCommandError> {
        let out = self.read(repo, &["ls-tree", "-r", "--name-only", rev]).await?;
        Ok(parse_line_list(&out))
    }

    async fn read_blob(&self, repo: &Path, rev: &str, path: &str) -> Result<Option<String>, GitCommandError> {
        let revspec = format!("{rev}:{path}");
        let out = self.read(repo, &["show", &revspec]).await?;
        Ok(Some(out).filter(|s| !s.is_empty()))
    }

    async fn count_commits_ahead(&self, repo: &Path, base: &str, branch: &str) -> Result<u64, GitCommandError> {
        let range = format!("{base}..{branch}");
        let out = self.read(repo, &["rev-list", "--count", &range]).await?;
        parse_commit_count(&out, &range)
    }

    async fn porcelain_status(&self, repo: &Path) -> Result<String, GitCommandError> {
        self.read(repo, &["status", "--porcelain"]).await
    }

    async fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitCommandError> {
        self.write(repo, &["checkout", branch]).await.map(|_| ())
    }

    async fn pull_ff_only(&self, repo: &Path) -> Result<(), GitCommandError> {
        self.write(repo, &["pull", "--ff-only"]).await.map(|_| ())
    }

    async fn merge_no_ff(&self, repo: &Path, branch: &str) -> Result<(), GitCommandError> {
        self.write(repo, &["merge", "--no-ff", "--no-edit", branch]).await.map(|_| ())
    }

    async fn merge_abort(&self, repo: &Path) -> Result<(), GitCommandError> {
        self.write(repo, &["merge", "--abort"]).await.map(|_| ())
    }

    fn last_fetch_at(&self, repo: &Path) -> Option<DateTime<Utc>> {
        let modified = std::fs::metadata(repo.join(".git").join("FETCH_HEAD"))
            .and_then(|m| m.modified())
            .ok()?;
        Some(DateTime::<Utc>::from(modified))
    }
}

/// Parse `for-each-ref` output produced with [`FIELD_SEPARATOR`]-joined fields.
///
/// Lines missing a name or SHA are dropped; an unparsable date becomes `None`.
pub fn parse_branch_listing(raw: &str) -> Vec<BranchSnapshot> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut parts = line.split(FIELD_SEPARATOR);
            let name = parts.next().filter(|s| !s.is_empty())?;
            let sha = parts.next().filter(|s| !s.is_empty())?;
            let last_commit_at = parts
                .next()
                .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
                .map(|d| d.with_timezone(&Utc));
            Some(BranchSnapshot {
                name: name.to_string(),
                head_commit: sha.to_string(),
                last_commit_at,
            })
        })
        .collect()
}

/// Split command output into trimmed, non-empty lines.
pub fn parse_line_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parse `rev-list --count` output. Anything but a bare integer is a failure.
fn parse_commit_count(raw: &str, range: &str) -> Result<u64, GitCommandError> {
    raw.trim().parse().map_err(|_| GitCommandError::Failed {
        args: format!("rev-list --count {range}"),
        code: None,
        stderr: format!("unexpected output: {:?}", raw.trim()),
    })
}
