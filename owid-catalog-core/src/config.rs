//! Catalog configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. Environment: `OWID_CATALOG_URL`, `OWID_CATALOG_TIMEOUT`,
//!    `OWID_CATALOG_CHANNELS` (comma-separated)
//! 2. `config.yaml` at an explicit path, or in the platform config directory
//!    (e.g. `~/.config/owid-catalog/config.yaml`)
//! 3. Built-in defaults
//!
//! ```yaml
//! default_channels: [garden]
//! remote:
//!   url: https://catalog.ourworldindata.org/
//!   timeout_seconds: 30
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::channel::Channel;

/// Default published catalog endpoint
pub const DEFAULT_CATALOG_URL: &str = "https://catalog.ourworldindata.org/";

pub const ENV_URL: &str = "OWID_CATALOG_URL";
pub const ENV_TIMEOUT: &str = "OWID_CATALOG_TIMEOUT";
pub const ENV_CHANNELS: &str = "OWID_CATALOG_CHANNELS";

/// Top-level catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Channels searched when a query names none
    #[serde(default = "default_channels")]
    pub default_channels: Vec<Channel>,

    /// Remote catalog settings
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Settings for fetching a remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL serving `catalog.json` and the table bodies
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_channels() -> Vec<Channel> {
    vec![Channel::DEFAULT]
}

fn default_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("owid-catalog/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_channels: default_channels(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl CatalogConfig {
    /// Load from the platform config directory, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::default_config_path() {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Load from a specific file; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No catalog config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog config: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse catalog config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).context("Invalid catalog config YAML")
    }

    /// `<config dir>/owid-catalog/config.yaml`, when the platform has one
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "ourworldindata", "owid-catalog")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Apply `OWID_CATALOG_*` environment variables on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var(ENV_URL) {
            debug!("Using catalog URL from {}: {}", ENV_URL, url);
            self.remote.url = url;
        }

        if let Ok(timeout) = std::env::var(ENV_TIMEOUT) {
            self.remote.timeout_seconds = timeout
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT} must be a number of seconds"))?;
        }

        if let Ok(channels) = std::env::var(ENV_CHANNELS) {
            self.default_channels = channels
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|c| c.parse::<Channel>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Invalid {ENV_CHANNELS}"))?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_channels.is_empty() {
            anyhow::bail!("At least one default channel is required");
        }

        if !self.remote.url.starts_with("http://") && !self.remote.url.starts_with("https://") {
            anyhow::bail!(
                "Catalog URL must start with http:// or https:// (got '{}')",
                self.remote.url
            );
        }

        if self.remote.timeout_seconds == 0 {
            warn!("Catalog timeout of 0 seconds will be raised to the minimum");
        }

        Ok(())
    }
}
