// ABOUTME: Behavioral tests for monitor ticks syncing task records from feature branches
// Verifies status updates, local-edit preservation, write idempotence, and provenance

use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;

use tasksync::config::MonitorConfig;
use tasksync::monitor::GitMonitor;

use super::fixtures::TestRepo;
use crate::require_git;

const LOCAL_42: &str = r#"{
  "id": "42",
  "title": "Login",
  "status": "in_progress",
  "context": { "owner": "web" },
  "features": [
    { "id": "42.1", "title": "Add login", "status": "in_progress", "blockers": [] }
  ],
  "featureIdToDisplayIndex": { "42.1": 1 }
}
"#;

fn monitor(repo: &TestRepo) -> GitMonitor {
    GitMonitor::from_config(repo.path(), &MonitorConfig::default())
}

fn read_json(repo: &TestRepo, relative: &str) -> Result<Value> {
    Ok(serde_json::from_str(&fs::read_to_string(repo.path().join(relative))?)?)
}

/// Commit a task document on `features/<id>` and return to main
fn commit_on_feature_branch(repo: &TestRepo, id: &str, doc: &str) -> Result<String> {
    repo.create_branch(&format!("features/{id}"))?;
    let sha = repo.add_commit(&format!("tasks/{id}/task.json"), doc, "Update task state")?;
    repo.checkout("main")?;
    Ok(sha)
}

/// Branch state flows into the local record; local titles and unknown fields survive
#[tokio::test]
async fn test_tick_applies_branch_state() -> Result<()> {
    require_git!();
    let repo = TestRepo::new()?;
    let head = commit_on_feature_branch(
        &repo,
        "42",
        r#"{"id":"42","status":"in_review","features":[{"id":"42.1","title":"Renamed","status":"done"},{"id":"42.2","title":"Add logout","status":"todo"}]}"#,
    )?;
    // The local record lives in main's working tree, untracked.
    repo.write_file("tasks/42/task.json", LOCAL_42)?;

    monitor(&repo).tick().await;

    let record = read_json(&repo, "tasks/42/task.json")?;
    assert_eq!(record["status"], "in_review");
    assert_eq!(record["context"]["owner"], "web");
    assert_eq!(record["features"][0]["title"], "Add login");
    assert_eq!(record["features"][0]["status"], "done");
    assert_eq!(record["features"][0]["blockers"], serde_json::json!([]));
    assert_eq!(record["features"][1]["id"], "42.2");
    assert_eq!(record["featureIdToDisplayIndex"]["42.2"], 2);
    assert_eq!(record["gitSync"]["lastCommit"], head.as_str());
    assert_eq!(record["gitSync"]["lastBranch"], "features/42");
    assert_eq!(repo.current_branch()?, "main");
    Ok(())
}

/// A second process re-syncing the same commit leaves the file byte-identical
#[tokio::test]
async fn test_resync_of_same_commit_is_byte_identical() -> Result<()> {
    require_git!();
    let repo = TestRepo::new()?;
    commit_on_feature_branch(
        &repo,
        "42",
        r#"{"id":"42","status":"in_review","features":[{"id":"42.1","status":"done"}]}"#,
    )?;
    repo.write_file("tasks/42/task.json", LOCAL_42)?;

    monitor(&repo).tick().await;
    let first = fs::read_to_string(repo.path().join("tasks/42/task.json"))?;

    // Fresh monitor, empty cache: the branch is analyzed again.
    monitor(&repo).tick().await;
    let second = fs::read_to_string(repo.path().join("tasks/42/task.json"))?;

    assert_eq!(first, second);
    Ok(())
}

/// Branches without a local record are skipped; nothing is created
#[tokio::test]
async fn test_missing_local_record_is_not_created() -> Result<()> {
    require_git!();
    let repo = TestRepo::new()?;
    commit_on_feature_branch(&repo, "77", r#"{"id":"77","status":"done"}"#)?;

    let monitor = monitor(&repo);
    let status = monitor.tick().await;

    assert!(status.branch("features/77").is_some());
    assert!(!repo.path().join("tasks/77/task.json").exists());
    Ok(())
}

/// A new commit on the branch is picked up on the next tick
#[tokio::test]
async fn test_new_branch_commit_is_synced_next_tick() -> Result<()> {
    require_git!();
    let repo = TestRepo::new()?;
    commit_on_feature_branch(&repo, "42", r#"{"id":"42","status":"in_review"}"#)?;
    repo.write_file("tasks/42/task.json", LOCAL_42)?;

    let monitor = monitor(&repo);
    monitor.tick().await;
    assert_eq!(read_json(&repo, "tasks/42/task.json")?["status"], "in_review");

    // Hide the untracked record while switching branches.
    let local = fs::read_to_string(repo.path().join("tasks/42/task.json"))?;
    fs::remove_file(repo.path().join("tasks/42/task.json"))?;
    repo.checkout("features/42")?;
    let head = repo.add_commit("tasks/42/task.json", r#"{"id":"42","status":"done"}"#, "Done")?;
    repo.checkout("main")?;
    repo.write_file("tasks/42/task.json", &local)?;

    monitor.tick().await;

    let record = read_json(&repo, "tasks/42/task.json")?;
    assert_eq!(record["status"], "done");
    assert_eq!(record["gitSync"]["lastCommit"], head.as_str());
    assert_eq!(monitor.cached_head("features/42").await, Some(head));
    Ok(())
}

/// Status reflects real refs and is stable across reads
#[tokio::test]
async fn test_status_reflects_refs() -> Result<()> {
    require_git!();
    let repo = TestRepo::new()?;
    let head = commit_on_feature_branch(&repo, "5", "{}")?;

    let monitor = monitor(&repo);
    let first = monitor.get_status().await;
    let second = monitor.get_status().await;

    assert_eq!(first.current_branch.as_deref(), Some("main"));
    assert_eq!(
        first.branch("features/5").map(|b| b.head_commit.clone()),
        Some(head)
    );
    assert_eq!(first.branches, second.branches);
    Ok(())
}

/// A directory without .git yields an empty status
#[tokio::test]
async fn test_non_repository_root() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let monitor = GitMonitor::from_config(dir.path(), &MonitorConfig::default());

    let status = monitor.tick().await;

    assert!(status.repo_path.is_none());
    assert!(status.branches.is_empty());
    Ok(())
}
