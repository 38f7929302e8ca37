//! Database configuration via `nodwatch.toml`
//!
//! On first open of a data directory a commented default file is written.
//! Settings change by editing the file and reopening.

use crate::search::SyncMode;
use nodwatch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "nodwatch.toml";

/// Default number of results per search page.
pub const DEFAULT_PER_PAGE: usize = 25;

/// `[search]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Serve search queries and keep the index in sync with commits.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `"inline"` or `"deferred"`.
    #[serde(default = "default_sync_mode")]
    pub sync_mode: String,
    /// Default page size for typed search results.
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_mode: default_sync_mode(),
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// `[jobs]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Worker threads running background jobs.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Queued jobs beyond this are rejected.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_queue_depth: default_max_queue_depth(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sync_mode() -> String {
    "inline".to_string()
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

fn default_workers() -> usize {
    2
}

fn default_max_queue_depth() -> usize {
    1024
}

/// Database configuration loaded from `nodwatch.toml`.
///
/// # Example
///
/// ```toml
/// [search]
/// enabled = true
/// sync_mode = "inline"
/// per_page = 25
///
/// [jobs]
/// workers = 2
/// max_queue_depth = 1024
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodwatchConfig {
    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,
    /// Background job settings
    #[serde(default)]
    pub jobs: JobsConfig,
}

impl NodwatchConfig {
    /// Parse `search.sync_mode`.
    pub fn sync_mode(&self) -> Result<SyncMode> {
        self.search.sync_mode.parse()
    }

    /// Reject values that can never work.
    pub fn validate(&self) -> Result<()> {
        self.sync_mode()?;
        if self.search.per_page == 0 {
            return Err(Error::Config("search.per_page must be at least 1".into()));
        }
        if self.jobs.workers == 0 {
            return Err(Error::Config("jobs.workers must be at least 1".into()));
        }
        if self.jobs.max_queue_depth == 0 {
            return Err(Error::Config(
                "jobs.max_queue_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Nodwatch configuration

[search]
# Keep a full-text index in sync with commits and serve search queries.
# When false, searches fail with "search unavailable".
enabled = true

# "inline"   = apply index changes right after each commit (default)
# "deferred" = hand them to a background worker; still applied in commit order
sync_mode = "inline"

# Default page size for search results.
per_page = 25

[jobs]
# Worker threads for background tasks such as exports.
workers = 2

# Submissions beyond this many queued jobs are rejected.
max_queue_depth = 1024
"#
    }

    /// Parse config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: NodwatchConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns whether a file was created.
    pub fn write_default_if_missing(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_toml())?;
        Ok(true)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
