// ABOUTME: Configuration management for tasksync
// Layered TOML: user ~/.tasksync/config.toml, overridden by <repo>/.tasksync/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::git::DEFAULT_FEATURE_BRANCH_PREFIX;
use crate::models::DocumentKind;
use crate::monitor::{DEFAULT_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};

const CONFIG_DIR_NAME: &str = ".tasksync";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Repository monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Delay between polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Prefix that marks a branch as carrying one task
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Which documents to track: "task" or "story"
    #[serde(default)]
    pub document: DocumentKind,

    /// Timeout for read-only git calls
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Timeout for checkout, pull and merge
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            branch_prefix: default_branch_prefix(),
            document: DocumentKind::default(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

impl MonitorConfig {
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub const fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One config file as written. Every field is optional so a file only
/// overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    #[serde(default)]
    monitor: MonitorLayer,
}

#[derive(Debug, Default, Deserialize)]
struct MonitorLayer {
    poll_interval_ms: Option<u64>,
    branch_prefix: Option<String>,
    document: Option<DocumentKind>,
    read_timeout_secs: Option<u64>,
    write_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load configuration for a repository root.
    pub fn load(project_root: &Path) -> Result<Self> {
        Self::load_from_paths(&Self::get_config_paths(project_root))
    }

    /// Load and merge `paths` in order; later files win. Missing files are skipped.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Self::default();

        for path in paths {
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            let layer: ConfigLayer = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?;

            debug!(path = %path.display(), "Loaded config layer");
            config.merge(layer, path);
        }

        Ok(config)
    }

    /// Configuration file paths, lowest precedence first
    fn get_config_paths(project_root: &Path) -> Vec<PathBuf> {
        let mut paths = vec![];

        // 1. User config (~/.tasksync/config.toml)
        if let Ok(config_dir) = Self::get_user_config_dir() {
            paths.push(config_dir.join(CONFIG_FILE_NAME));
        }

        // 2. Project config overrides the user's
        paths.push(project_root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));

        paths
    }

    /// User-level config and log directory
    pub fn get_user_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(CONFIG_DIR_NAME))
    }

    fn merge(&mut self, layer: ConfigLayer, source: &Path) {
        let m = layer.monitor;
        let monitor = &mut self.monitor;

        if let Some(ms) = m.poll_interval_ms {
            if (MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&ms) {
                monitor.poll_interval_ms = ms;
            } else {
                warn!(
                    path = %source.display(),
                    poll_interval_ms = ms,
                    "Ignoring out-of-range poll interval"
                );
            }
        }

        if let Some(prefix) = m.branch_prefix {
            if prefix.trim().is_empty() {
                warn!(path = %source.display(), "Ignoring empty branch prefix");
            } else {
                monitor.branch_prefix = prefix;
            }
        }

        if let Some(document) = m.document {
            monitor.document = document;
        }

        for (value, slot, name) in [
            (m.read_timeout_secs, &mut monitor.read_timeout_secs, "read_timeout_secs"),
            (m.write_timeout_secs, &mut monitor.write_timeout_secs, "write_timeout_secs"),
        ] {
            match value {
                Some(0) => warn!(path = %source.display(), key = name, "Ignoring zero timeout"),
                Some(secs) => *slot = secs,
                None => {}
            }
        }
    }
}

// Default value functions
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_branch_prefix() -> String {
    DEFAULT_FEATURE_BRANCH_PREFIX.to_string()
}

const fn default_read_timeout_secs() -> u64 {
    20
}

const fn default_write_timeout_secs() -> u64 {
    60
}
