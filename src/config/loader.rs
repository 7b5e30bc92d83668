//! Configuration structures and loading logic.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub pools: PoolConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub sources: SourcesConfig,
}

/// HTTP session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Browser user agent string sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referer header sent with every request, if any.
    #[serde(default)]
    pub referer: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Download options configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Base directory for downloads.
    #[serde(default)]
    pub download_directory: Option<PathBuf>,

    /// Extension allow-list (e.g. ["jpg", "mp4"]). Empty accepts everything.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Number of attempts per item before giving up.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Write resolved URLs to url_list.txt instead of downloading.
    #[serde(default)]
    pub export_urls: bool,

    /// Whether to show download progress.
    #[serde(default = "default_true")]
    pub show_downloads: bool,
}

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of resolver workers.
    #[serde(default = "default_resolver_workers")]
    pub resolver_workers: usize,

    /// Number of download workers.
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    /// Capacity of each stage's work queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Rate-limit feedback controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Baseline delay before every request, in seconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: f64,

    /// Penalty weight at which the controller starts backing off.
    #[serde(default = "default_max_penalty_weight")]
    pub max_penalty_weight: u32,

    /// Multiplier for per-attempt backoff sleeps on HTTP 429.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

/// External source lists fed to the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Ordered CDN hostnames to probe when a page only exposes a
    /// gallery redirect.
    #[serde(default)]
    pub cdn_hosts: Vec<String>,

    /// Redirect targets that mean the host is down for maintenance.
    #[serde(default = "default_maintenance_markers")]
    pub maintenance_markers: Vec<String>,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_resolver_workers() -> usize {
    8
}

fn default_download_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_max_penalty_weight() -> u32 {
    10
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_maintenance_markers() -> Vec<String> {
    vec!["https://bnkr.b-cdn.net/maintenance.mp4".to_string()]
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            referer: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            download_directory: None,
            extensions: Vec::new(),
            retries: default_retries(),
            export_urls: false,
            show_downloads: true,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            resolver_workers: default_resolver_workers(),
            download_workers: default_download_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            initial_delay_seconds: default_initial_delay(),
            max_penalty_weight: default_max_penalty_weight(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the effective download root directory.
    pub fn download_directory(&self) -> PathBuf {
        self.options
            .download_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }
}
