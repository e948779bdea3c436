// ABOUTME: CLI argument parsing and command routing for tasksync
//
// Provides command-line interface for:
// - Inspecting repository state (status, poll, watch)
// - Checking and merging feature branches (unmerged, merge)
// - Debugging task documents and branch naming (analyze, branch-name)

pub mod branch;
pub mod status;
pub mod util;
pub mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Sync task records from feature branches and merge them when done
#[derive(Parser)]
#[command(name = "tasksync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Repository root to monitor
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Poll interval in milliseconds (overrides config)
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,
}

/// Output format for commands
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show repository status without syncing
    Status,

    /// Run one poll: sync every feature branch, then show status
    Poll,

    /// Poll continuously until interrupted
    Watch,

    /// Check whether a branch has commits its base lacks
    Unmerged(UnmergedArgs),

    /// Merge a feature branch into its base
    Merge(MergeArgs),

    /// Show the task document found at a branch head
    Analyze(AnalyzeArgs),

    /// Print the feature branch name for a task id
    BranchName(BranchNameArgs),
}

/// Arguments for the unmerged command
#[derive(clap::Args)]
pub struct UnmergedArgs {
    /// Branch to check
    pub branch: String,

    /// Base branch (defaults to the current branch)
    #[arg(long)]
    pub base: Option<String>,
}

/// Arguments for the merge command
#[derive(clap::Args)]
pub struct MergeArgs {
    /// Branch to merge
    pub branch: String,

    /// Base branch (defaults to the current branch)
    #[arg(long)]
    pub base: Option<String>,
}

/// Arguments for the analyze command
#[derive(clap::Args)]
pub struct AnalyzeArgs {
    /// Branch whose head commit is analyzed
    pub branch: String,
}

/// Arguments for the branch-name command
#[derive(clap::Args)]
pub struct BranchNameArgs {
    /// Task id
    pub task_id: String,
}

impl Cli {
    /// Load config for `--repo` and apply flag overrides.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(&self.repo)?;
        if let Some(ms) = self.interval_ms {
            config.monitor.poll_interval_ms = ms;
        }
        Ok(config)
    }
}
