// ABOUTME: Background poll loop driving GitMonitor ticks at a configurable interval
// ABOUTME: Supports start/stop, immediate triggers, and live interval changes

//! Poll scheduling for a [`GitMonitor`].
//!
//! The loop ticks, then sleeps until either the interval elapses or it is
//! woken early by [`PollScheduler::trigger_now`] / [`PollScheduler::set_interval`].
//! Overlap is impossible because every tick goes through the monitor's
//! state lock.
//!
//! # Usage
//!
//! ```ignore
//! let monitor = Arc::new(GitMonitor::from_config(root, &config.monitor));
//! let mut scheduler = PollScheduler::new(Arc::clone(&monitor), config.monitor.poll_interval_ms)?;
//! scheduler.start();
//! // ...
//! scheduler.stop().await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{GitMonitor, MonitorError};

pub const MIN_POLL_INTERVAL_MS: u64 = 5_000;
pub const MAX_POLL_INTERVAL_MS: u64 = 600_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;

fn validate_interval(ms: u64) -> Result<u64, MonitorError> {
    if (MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&ms) {
        Ok(ms)
    } else {
        Err(MonitorError::InvalidPollInterval(ms))
    }
}

pub struct PollScheduler {
    monitor: Arc<GitMonitor>,

    /// Current interval; read by the loop before every sleep.
    interval_ms: Arc<AtomicU64>,

    /// Shutdown flag for graceful termination.
    shutdown: Arc<AtomicBool>,

    /// Wakes the loop early for a trigger or interval change.
    wake: Arc<Notify>,

    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(monitor: Arc<GitMonitor>, interval_ms: u64) -> Result<Self, MonitorError> {
        let interval_ms = validate_interval(interval_ms)?;
        Ok(Self {
            monitor,
            interval_ms: Arc::new(AtomicU64::new(interval_ms)),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            handle: None,
        })
    }

    /// Any interval, including ones below the minimum.
    #[cfg(test)]
    pub(crate) fn with_unchecked_interval(monitor: Arc<GitMonitor>, interval_ms: u64) -> Self {
        Self {
            monitor,
            interval_ms: Arc::new(AtomicU64::new(interval_ms)),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            handle: None,
        }
    }

    /// Start the poll loop. The first tick runs immediately.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.shutdown.store(false, Ordering::SeqCst);

        let monitor = Arc::clone(&self.monitor);
        let interval_ms = Arc::clone(&self.interval_ms);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);

        self.handle = Some(tokio::spawn(async move {
            Self::poll_loop(monitor, interval_ms, shutdown, wake).await;
        }));
        info!(interval_ms = self.interval(), "Poll scheduler started");
    }

    /// Stop the loop and wait for any in-flight tick or merge to finish.
    pub async fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();

        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        self.monitor.quiesce().await;

        info!("Poll scheduler stopped");
    }

    /// Run a tick now instead of waiting for the timer.
    pub fn trigger_now(&self) {
        self.wake.notify_one();
    }

    /// Change the interval. Takes effect immediately with a fresh tick.
    pub fn set_interval(&self, ms: u64) -> Result<(), MonitorError> {
        let ms = validate_interval(ms)?;
        self.interval_ms.store(ms, Ordering::SeqCst);
        debug!(interval_ms = ms, "Poll interval updated");
        self.wake.notify_one();
        Ok(())
    }

    pub fn interval(&self) -> u64 {
        self.interval_ms.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.shutdown.load(Ordering::SeqCst)
    }

    async fn poll_loop(
        monitor: Arc<GitMonitor>,
        interval_ms: Arc<AtomicU64>,
        shutdown: Arc<AtomicBool>,
        wake: Arc<Notify>,
    ) {
        while !shutdown.load(Ordering::SeqCst) {
            monitor.tick().await;

            let sleep = Duration::from_millis(interval_ms.load(Ordering::SeqCst));
            tokio::select! {
                () = tokio::time::sleep(sleep) => {}
                () = wake.notified() => {}
            }
        }
        debug!("Poll loop exited");
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
