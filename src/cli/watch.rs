// ABOUTME: CLI watch command - poll on a timer and print every status change until Ctrl-C

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::status::output;
use super::OutputFormat;
use crate::monitor::MonitorService;

/// Execute the watch command
pub async fn execute(service: &MonitorService, format: OutputFormat) -> Result<()> {
    let mut updates = service.subscribe();
    let prefix = service.monitor().naming().prefix().to_string();

    service.start().await;
    info!(interval_ms = service.poll_interval().await, "Watching repository");

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.context("Failed to listen for Ctrl-C");
            }
            update = updates.recv() => match update {
                Ok(status) => {
                    if let Err(e) = output(&status, &prefix, format) {
                        break Err(e);
                    }
                    println!();
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Status updates dropped"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    // Lets an in-flight merge or tick finish before exit.
    service.stop().await;
    result
}
