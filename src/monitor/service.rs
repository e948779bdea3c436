// ABOUTME: Caller-facing operations over one repository: status, polling, unmerged checks, merges
// ABOUTME: Bundles the GitMonitor with its PollScheduler so hosts only hold one handle

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use super::{GitMonitor, MergeOutcome, MonitorError, PollScheduler, UnmergedReport};
use crate::config::MonitorConfig;
use crate::models::RepositoryStatus;

pub struct MonitorService {
    monitor: Arc<GitMonitor>,
    scheduler: Mutex<PollScheduler>,
}

impl MonitorService {
    pub fn new(monitor: Arc<GitMonitor>, poll_interval_ms: u64) -> Result<Self, MonitorError> {
        let scheduler = PollScheduler::new(Arc::clone(&monitor), poll_interval_ms)?;
        Ok(Self {
            monitor,
            scheduler: Mutex::new(scheduler),
        })
    }

    pub fn from_config(project_root: impl Into<PathBuf>, config: &MonitorConfig) -> Result<Self, MonitorError> {
        let monitor = Arc::new(GitMonitor::from_config(project_root, config));
        Self::new(monitor, config.poll_interval_ms)
    }

    pub const fn monitor(&self) -> &Arc<GitMonitor> {
        &self.monitor
    }

    /// Fresh status without scanning branches.
    pub async fn get_status(&self) -> RepositoryStatus {
        self.monitor.get_status().await
    }

    /// Run a full poll now and return the status it computed. Waits behind
    /// any poll already in flight.
    pub async fn trigger_poll(&self) -> RepositoryStatus {
        self.monitor.tick().await
    }

    pub async fn set_poll_interval(&self, ms: u64) -> Result<(), MonitorError> {
        self.scheduler.lock().await.set_interval(ms)
    }

    pub async fn poll_interval(&self) -> u64 {
        self.scheduler.lock().await.interval()
    }

    pub async fn has_unmerged_commits(&self, branch: &str, base: Option<&str>) -> Result<UnmergedReport, MonitorError> {
        self.monitor.has_unmerged_commits(branch, base).await
    }

    pub async fn merge_branch_into_base(&self, branch: &str, base: Option<&str>) -> Result<MergeOutcome, MonitorError> {
        self.monitor.merge_branch_into_base(branch, base).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryStatus> {
        self.monitor.subscribe()
    }

    pub async fn start(&self) {
        self.scheduler.lock().await.start();
    }

    /// Stop polling. Returns once any in-flight tick or merge has finished.
    pub async fn stop(&self) {
        self.scheduler.lock().await.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_running()
    }
}
