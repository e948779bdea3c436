// ABOUTME: Behavioral tests for merging feature branches into their base with real git
// Verifies the happy path, no-op merges, conflict recovery, and precondition failures

use anyhow::Result;
use pretty_assertions::assert_eq;

use tasksync::config::MonitorConfig;
use tasksync::monitor::{GitMonitor, MergePhase, MonitorError};

use super::fixtures::TestRepo;
use crate::require_git;

fn monitor(repo: &TestRepo) -> GitMonitor {
    GitMonitor::from_config(repo.path(), &MonitorConfig::default())
}

/// Feature branch with one commit, left checked out on main
fn repo_with_feature() -> Result<TestRepo> {
    let repo = TestRepo::new()?;
    repo.create_branch("features/42")?;
    repo.add_commit("src/login.rs", "fn login() {}\n", "Add login")?;
    repo.checkout("main")?;
    Ok(repo)
}

/// Unmerged commits are counted before the merge and gone after it
#[tokio::test]
async fn test_merge_creates_merge_commit() -> Result<()> {
    require_git!();
    let repo = repo_with_feature()?;
    let monitor = monitor(&repo);

    let before = monitor.has_unmerged_commits("features/42", None).await?;
    assert!(before.has_unmerged);
    assert_eq!(before.ahead_count, 1);

    let outcome = monitor.merge_branch_into_base("features/42", Some("main")).await?;

    assert!(outcome.merged);
    assert_eq!(outcome.commit, Some(repo.head_sha("main")?));
    assert_eq!(repo.git(&["rev-list", "--count", "--merges", "main"])?, "1");
    assert!(repo.path().join("src/login.rs").exists());
    assert!(repo.porcelain()?.is_empty());
    assert_eq!(*monitor.merge_phase().borrow(), MergePhase::Done);

    let after = monitor.has_unmerged_commits("features/42", Some("main")).await?;
    assert!(!after.has_unmerged);
    Ok(())
}

/// Merge refreshes the monitor snapshot with the new base head
#[tokio::test]
async fn test_merge_refreshes_snapshot() -> Result<()> {
    require_git!();
    let repo = repo_with_feature()?;
    let monitor = monitor(&repo);
    monitor.tick().await;
    let mut updates = monitor.subscribe();

    let outcome = monitor.merge_branch_into_base("features/42", None).await?;

    let pushed = updates.try_recv()?;
    assert_eq!(
        pushed.branch("main").map(|b| b.head_commit.clone()),
        outcome.commit
    );
    Ok(())
}

/// Nothing to merge short-circuits without a merge commit
#[tokio::test]
async fn test_no_commits_to_merge() -> Result<()> {
    require_git!();
    let repo = TestRepo::new()?;
    repo.git(&["branch", "features/1"])?;
    let head = repo.head_sha("main")?;

    let outcome = monitor(&repo).merge_branch_into_base("features/1", Some("main")).await?;

    assert!(!outcome.merged);
    assert_eq!(outcome.reason.as_deref(), Some("No commits to merge"));
    assert_eq!(repo.head_sha("main")?, head);
    Ok(())
}

/// A conflicting merge is aborted and the tree is clean afterwards
#[tokio::test]
async fn test_conflict_is_aborted() -> Result<()> {
    require_git!();
    let repo = TestRepo::new()?;
    repo.create_branch("features/9")?;
    repo.add_commit("README.md", "# Feature side\n", "Feature edit")?;
    repo.checkout("main")?;
    let base_head = repo.add_commit("README.md", "# Main side\n", "Main edit")?;

    let monitor = monitor(&repo);
    let err = monitor
        .merge_branch_into_base("features/9", Some("main"))
        .await
        .unwrap_err();

    assert!(matches!(err, MonitorError::MergeConflict { .. }), "got {err:?}");
    assert!(repo.porcelain()?.is_empty());
    assert!(!repo.path().join(".git/MERGE_HEAD").exists());
    assert_eq!(repo.head_sha("main")?, base_head);
    assert_eq!(*monitor.merge_phase().borrow(), MergePhase::Failed);
    Ok(())
}

/// A dirty tree is rejected before any branch switch
#[tokio::test]
async fn test_dirty_tree_rejected() -> Result<()> {
    require_git!();
    let repo = repo_with_feature()?;
    repo.checkout("features/42")?;
    repo.write_file("scratch.txt", "wip")?;

    let err = monitor(&repo)
        .merge_branch_into_base("features/42", Some("main"))
        .await
        .unwrap_err();

    assert!(matches!(err, MonitorError::DirtyWorkingTree));
    assert_eq!(repo.current_branch()?, "features/42");
    Ok(())
}

/// Unknown branches and self-merges are refused
#[tokio::test]
async fn test_precondition_failures() -> Result<()> {
    require_git!();
    let repo = TestRepo::new()?;
    let monitor = monitor(&repo);

    let missing = monitor.merge_branch_into_base("features/none", None).await.unwrap_err();
    assert!(matches!(missing, MonitorError::BranchNotFound(_)));

    let same = monitor.merge_branch_into_base("main", None).await.unwrap_err();
    assert!(matches!(same, MonitorError::SelfMerge(_)));

    let report = monitor.has_unmerged_commits("features/none", None).await?;
    assert!(report.not_found);
    assert!(!report.has_unmerged);
    Ok(())
}
