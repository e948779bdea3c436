// ABOUTME: CLI status and poll commands
//
// status: read-only snapshot of branches and fetch time
// poll: one full tick (syncs feature branches), then the resulting snapshot

use anyhow::Result;

use super::util::{format_status, print_json};
use super::OutputFormat;
use crate::models::RepositoryStatus;
use crate::monitor::GitMonitor;

/// Execute the status command
pub async fn execute(monitor: &GitMonitor, format: OutputFormat) -> Result<()> {
    let status = monitor.get_status().await;
    output(&status, monitor.naming().prefix(), format)
}

/// Execute the poll command
pub async fn poll(monitor: &GitMonitor, format: OutputFormat) -> Result<()> {
    let status = monitor.tick().await;
    output(&status, monitor.naming().prefix(), format)
}

pub fn output(status: &RepositoryStatus, feature_prefix: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(status)?,
        OutputFormat::Text => {
            for line in format_status(status, feature_prefix) {
                println!("{line}");
            }
        }
    }
    Ok(())
}
