// ABOUTME: Main entry point for tasksync
//
// Binary: tasksync
// Usage: tasksync [--repo PATH] [--format text|json] COMMAND
// - status: show branches without syncing
// - poll: sync feature branches once
// - watch: poll continuously until Ctrl-C
// - unmerged / merge: inspect and merge a feature branch
// - analyze: show the task document at a branch head
// - branch-name: map a task id to its branch

#![allow(missing_docs)]

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use tasksync::cli::{self, Commands};
use tasksync::git::BranchNamingConvention;
use tasksync::monitor::{GitMonitor, MonitorService};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    setup_panic_handler();

    let args = cli::Cli::parse();
    let config = args.load_config()?;
    let monitor_config = &config.monitor;

    let format = args.format;
    if !matches!(args.command, Commands::BranchName(_)) && which::which("git").is_err() {
        anyhow::bail!("git executable not found on PATH");
    }

    let monitor = || GitMonitor::from_config(args.repo.clone(), monitor_config);

    match args.command {
        Commands::Status => cli::status::execute(&monitor(), format).await,
        Commands::Poll => cli::status::poll(&monitor(), format).await,
        Commands::Watch => {
            let service = MonitorService::from_config(args.repo.clone(), monitor_config)?;
            cli::watch::execute(&service, format).await
        }
        Commands::Unmerged(a) => cli::branch::unmerged(&monitor(), a, format).await,
        Commands::Merge(a) => cli::branch::merge(&monitor(), a, format).await,
        Commands::Analyze(a) => cli::branch::analyze(&monitor(), a, format).await,
        Commands::BranchName(a) => {
            let naming = BranchNamingConvention::new(monitor_config.branch_prefix.clone());
            cli::branch::branch_name(&naming, &a, format)
        }
    }
}

fn setup_logging() {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "tasksync=info".into())
    };

    // Create log directory if it doesn't exist
    let log_dir = dirs::home_dir()
        .map(|home| home.join(".tasksync").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".tasksync/logs"));

    let _ = std::fs::create_dir_all(&log_dir);

    // Create JSONL log file with timestamp
    let log_file = log_dir.join(format!(
        "tasksync-{}.jsonl",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    match OpenOptions::new().create(true).append(true).open(&log_file) {
        Ok(file) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()             // Output in JSON Lines format
                    .with_target(true)  // Include target module in JSON
                    .with_writer(file)
                    .with_ansi(false),
            )
            .with(filter())
            .init(),
        Err(e) => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(filter())
                .init();
            tracing::warn!(path = %log_file.display(), error = %e, "Log file unavailable, logging to stderr");
        }
    }
}

fn setup_panic_handler() {
    use tracing::error;

    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
