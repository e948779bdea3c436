// ABOUTME: CLI branch commands: unmerged, merge, analyze, branch-name
//
// unmerged/merge go through the monitor so merges refresh its snapshot.
// analyze is read-only and never touches local task records.

use anyhow::Result;
use serde::Serialize;

use super::util::{print_json, short_sha};
use super::{AnalyzeArgs, BranchNameArgs, MergeArgs, OutputFormat, UnmergedArgs};
use crate::git::{BranchNamingConvention, CommitAnalysis};
use crate::monitor::GitMonitor;

/// Execute the unmerged command
pub async fn unmerged(monitor: &GitMonitor, args: UnmergedArgs, format: OutputFormat) -> Result<()> {
    let report = monitor
        .has_unmerged_commits(&args.branch, args.base.as_deref())
        .await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            if report.has_unmerged {
                println!(
                    "{} is {} commit(s) ahead of {}",
                    report.branch, report.ahead_count, report.base
                );
            } else {
                let why = report.reason.as_deref().unwrap_or("up to date");
                println!("{} has nothing to merge into {} ({why})", report.branch, report.base);
            }
        }
    }
    Ok(())
}

/// Execute the merge command
pub async fn merge(monitor: &GitMonitor, args: MergeArgs, format: OutputFormat) -> Result<()> {
    let outcome = monitor
        .merge_branch_into_base(&args.branch, args.base.as_deref())
        .await?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => match (&outcome.commit, outcome.merged) {
            (Some(commit), true) => println!(
                "Merged {} into {} at {}",
                outcome.branch,
                outcome.base,
                short_sha(commit)
            ),
            (None, true) => println!("Merged {} into {}", outcome.branch, outcome.base),
            (_, false) => println!(
                "Not merged: {}",
                outcome.reason.as_deref().unwrap_or("unknown reason")
            ),
        },
    }
    Ok(())
}

/// JSON shape for the analyze command
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOutput<'a> {
    branch: &'a str,
    found: bool,
    #[serde(flatten)]
    analysis: &'a CommitAnalysis,
}

/// Execute the analyze command
pub async fn analyze(monitor: &GitMonitor, args: AnalyzeArgs, format: OutputFormat) -> Result<()> {
    let analysis = monitor.analyze_branch(&args.branch).await?;

    match format {
        OutputFormat::Json => print_json(&AnalyzeOutput {
            branch: &args.branch,
            found: analysis.found(),
            analysis: &analysis,
        })?,
        OutputFormat::Text => {
            let commit = analysis.commit.as_deref().map_or("?", short_sha);
            match (&analysis.document, &analysis.error) {
                (Some(hit), _) => {
                    let summary = hit.extracted.summary.as_ref();
                    println!("Branch:   {} @ {commit}", args.branch);
                    println!("Document: {}", hit.task_json_path);
                    println!("Id:       {}", summary.and_then(|s| s.id.as_deref()).unwrap_or("-"));
                    println!("Title:    {}", summary.and_then(|s| s.title.as_deref()).unwrap_or("-"));
                    println!("Status:   {}", hit.extracted.status.as_deref().unwrap_or("-"));
                    for feature in hit.extracted.features.iter().flatten() {
                        println!(
                            "  - {:<12} {:<12} {}",
                            feature.id.as_deref().unwrap_or("-"),
                            feature.status.as_deref().unwrap_or("-"),
                            feature.title.as_deref().unwrap_or("")
                        );
                    }
                }
                (None, Some(error)) => println!("{}: {error}", args.branch),
                (None, None) => println!("No task document at {} @ {commit}", args.branch),
            }
        }
    }
    Ok(())
}

/// Execute the branch-name command
pub fn branch_name(naming: &BranchNamingConvention, args: &BranchNameArgs, format: OutputFormat) -> Result<()> {
    let name = naming.task_id_to_branch_name(&args.task_id)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "taskId": args.task_id.trim(), "branch": name }))?,
        OutputFormat::Text => println!("{name}"),
    }
    Ok(())
}
