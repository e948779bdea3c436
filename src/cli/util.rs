// ABOUTME: Shared CLI output helpers: JSON printing and human-readable status rendering

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::RepositoryStatus;

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Render a status snapshot as text lines
pub fn format_status(status: &RepositoryStatus, feature_prefix: &str) -> Vec<String> {
    let Some(repo) = status.repo_path.as_ref() else {
        return vec!["No git repository detected.".to_string()];
    };

    let mut lines = vec![
        format!("Repository:   {}", repo.display()),
        format!("Branch:       {}", status.current_branch.as_deref().unwrap_or("(unknown)")),
        format!(
            "Last fetch:   {}",
            status
                .last_fetch_at
                .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        ),
        String::new(),
        format!("{:<40} {:<10} LAST COMMIT", "BRANCH", "HEAD"),
        "-".repeat(80),
    ];

    for branch in &status.branches {
        let marker = if status.current_branch.as_deref() == Some(branch.name.as_str()) {
            "*"
        } else if branch.name.starts_with(feature_prefix) {
            "+"
        } else {
            " "
        };
        let when = branch
            .last_commit_at
            .map_or_else(String::new, |t| t.format("%Y-%m-%d %H:%M").to_string());
        lines.push(format!(
            "{marker}{:<39} {:<10} {when}",
            branch.name,
            short_sha(&branch.head_commit)
        ));
    }

    lines
}

/// First seven characters of a commit id
pub fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
