// ABOUTME: In-memory GitBackend for unit tests: scripted branches, trees, and failure modes
// ABOUTME: Records every call so tests can assert on what the monitor asked git to do

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::backend::{GitBackend, GitCommandError};
use crate::models::BranchSnapshot;

#[derive(Debug, Default)]
pub struct FakeRepo {
    pub current: String,
    /// branch name -> head sha
    pub branches: BTreeMap<String, String>,
    /// sha -> (path -> content)
    pub trees: HashMap<String, BTreeMap<String, String>>,
    /// (base, branch) -> commits ahead
    pub ahead: HashMap<(String, String), u64>,
    pub upstreams: HashMap<String, String>,
    pub dirty: bool,
    pub fail_merge: bool,
    pub fail_pull: bool,
    pub fail_fetch: bool,
    pub merge_in_progress: bool,
    merges: u32,
}

pub struct FakeGit {
    pub repo: Mutex<FakeRepo>,
    calls: Mutex<Vec<String>>,
}

fn failed(args: &str, stderr: &str) -> GitCommandError {
    GitCommandError::Failed {
        args: args.to_string(),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

impl FakeGit {
    pub fn new(current: &str) -> Self {
        let repo = FakeRepo {
            current: current.to_string(),
            ..FakeRepo::default()
        };
        let fake = Self {
            repo: Mutex::new(repo),
            calls: Mutex::new(Vec::new()),
        };
        fake.set_branch(current, "base0", &[("README.md", "# repo\n")]);
        fake
    }

    /// Point `branch` at `sha` whose tree holds `files`.
    pub fn set_branch(&self, branch: &str, sha: &str, files: &[(&str, &str)]) {
        let mut repo = self.repo.lock().unwrap();
        repo.branches.insert(branch.to_string(), sha.to_string());
        repo.trees.insert(
            sha.to_string(),
            files.iter().map(|(p, c)| ((*p).to_string(), (*c).to_string())).collect(),
        );
    }

    pub fn set_ahead(&self, base: &str, branch: &str, count: u64) {
        self.repo
            .lock()
            .unwrap()
            .ahead
            .insert((base.to_string(), branch.to_string()), count);
    }

    pub fn with_repo<R>(&self, f: impl FnOnce(&mut FakeRepo) -> R) -> R {
        f(&mut self.repo.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GitBackend for FakeGit {
    async fn fetch_all(&self, _repo: &Path) -> Result<(), GitCommandError> {
        self.record("fetch".to_string());
        if self.repo.lock().unwrap().fail_fetch {
            return Err(failed("fetch --all --prune", "could not read from remote"));
        }
        Ok(())
    }

    async fn current_branch(&self, _repo: &Path) -> Result<String, GitCommandError> {
        self.record("current_branch".to_string());
        Ok(self.repo.lock().unwrap().current.clone())
    }

    async fn list_local_branches(&self, _repo: &Path) -> Result<Vec<BranchSnapshot>, GitCommandError> {
        self.record("list_branches".to_string());
        let repo = self.repo.lock().unwrap();
        Ok(repo
            .branches
            .iter()
            .map(|(name, sha)| BranchSnapshot {
                name: name.clone(),
                head_commit: sha.clone(),
                last_commit_at: None,
            })
            .collect())
    }

    async fn resolve_ref(&self, _repo: &Path, rev: &str) -> Result<Option<String>, GitCommandError> {
        self.record(format!("resolve {rev}"));
        let repo = self.repo.lock().unwrap();
        if rev == "HEAD" {
            return Ok(repo.branches.get(&repo.current).cloned());
        }
        Ok(repo
            .branches
            .get(rev)
            .cloned()
            .or_else(|| repo.trees.contains_key(rev).then(|| rev.to_string())))
    }

    async fn upstream_of(&self, _repo: &Path, branch: &str) -> Result<Option<String>, GitCommandError> {
        self.record(format!("upstream {branch}"));
        Ok(self.repo.lock().unwrap().upstreams.get(branch).cloned())
    }

    async fn list_tree(&self, _repo: &Path, rev: &str) -> Result<Vec<String>, GitCommandError> {
        self.record(format!("ls-tree {rev}"));
        let repo = self.repo.lock().unwrap();
        repo.trees
            .get(rev)
            .map(|files| files.keys().cloned().collect())
            .ok_or_else(|| failed("ls-tree", "not a tree object"))
    }

    async fn read_blob(&self, _repo: &Path, rev: &str, path: &str) -> Result<Option<String>, GitCommandError> {
        self.record(format!("show {rev}:{path}"));
        let repo = self.repo.lock().unwrap();
        match repo.trees.get(rev).and_then(|files| files.get(path)) {
            Some(content) => Ok(Some(content.clone()).filter(|c| !c.is_empty())),
            None => Err(failed("show", "path does not exist")),
        }
    }

    async fn count_commits_ahead(&self, _repo: &Path, base: &str, branch: &str) -> Result<u64, GitCommandError> {
        self.record(format!("rev-list {base}..{branch}"));
        let repo = self.repo.lock().unwrap();
        Ok(repo
            .ahead
            .get(&(base.to_string(), branch.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn porcelain_status(&self, _repo: &Path) -> Result<String, GitCommandError> {
        self.record("status".to_string());
        let repo = self.repo.lock().unwrap();
        Ok(if repo.dirty { " M README.md\n".to_string() } else { String::new() })
    }

    async fn checkout(&self, _repo: &Path, branch: &str) -> Result<(), GitCommandError> {
        self.record(format!("checkout {branch}"));
        let mut repo = self.repo.lock().unwrap();
        if !repo.branches.contains_key(branch) {
            return Err(failed("checkout", "pathspec did not match"));
        }
        repo.current = branch.to_string();
        Ok(())
    }

    async fn pull_ff_only(&self, _repo: &Path) -> Result<(), GitCommandError> {
        self.record("pull --ff-only".to_string());
        if self.repo.lock().unwrap().fail_pull {
            return Err(failed("pull --ff-only", "Not possible to fast-forward, aborting."));
        }
        Ok(())
    }

    async fn merge_no_ff(&self, _repo: &Path, branch: &str) -> Result<(), GitCommandError> {
        self.record(format!("merge {branch}"));
        let mut repo = self.repo.lock().unwrap();
        if repo.fail_merge {
            repo.dirty = true;
            repo.merge_in_progress = true;
            return Err(failed("merge --no-ff --no-edit", "CONFLICT (content): Merge conflict"));
        }
        repo.merges += 1;
        let sha = format!("merge{}", repo.merges);
        let base = repo.current.clone();
        repo.branches.insert(base.clone(), sha.clone());
        repo.trees.insert(sha, BTreeMap::new());
        repo.ahead.insert((base, branch.to_string()), 0);
        Ok(())
    }

    async fn merge_abort(&self, _repo: &Path) -> Result<(), GitCommandError> {
        self.record("merge --abort".to_string());
        let mut repo = self.repo.lock().unwrap();
        repo.dirty = false;
        repo.merge_in_progress = false;
        Ok(())
    }

    fn last_fetch_at(&self, _repo: &Path) -> Option<DateTime<Utc>> {
        None
    }
}
