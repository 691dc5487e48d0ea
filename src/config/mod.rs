//! Configuration management for invkit
//!
//! Settings resolve in this order: CLI flag, environment variable, config
//! file, built-in default. The file lives at `~/.invkit/config.yaml` unless
//! `--config` points elsewhere.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::client::RetryPolicy;
use crate::client::pagination::MAX_PAGE_SIZE;
use crate::error::{ConfigError, Result};

/// Default Inventory API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.firefly.ai";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Inventory API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Inventory API access key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Inventory API secret key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Records requested per inventory page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Retry behaviour for transient API failures
    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum concurrent collection tasks
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_key: None,
            secret_key: None,
            page_size: default_page_size(),
            retry_policy: RetryPolicy::default(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".invkit").join("config.yaml"))
    }

    /// Load configuration from an explicit path, or the default location.
    ///
    /// A missing file at the default location is not an error: every
    /// setting can come from flags or the environment. A missing file the
    /// user named explicitly is.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load_from(Path::new(explicit)),
            None => {
                let default = Self::default_path()?;
                if default.exists() {
                    Self::load_from(&default)
                } else {
                    log::debug!("No config file at {}, using defaults", default.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&contents).map_err(ConfigError::from)?
        };
        config.validate()?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override file values with CLI flags and environment variables.
    pub fn apply_overrides(
        &mut self,
        base_url: Option<&str>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
    ) {
        if let Some(url) = base_url {
            self.base_url = url.to_string();
        }
        if let Some(key) = access_key {
            self.access_key = Some(key.to_string());
        }
        if let Some(secret) = secret_key {
            self.secret_key = Some(secret.to_string());
        }
    }

    /// Reject values no request could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            ))
            .into());
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(
                ConfigError::Invalid("retry_policy.max_attempts must be at least 1".into()).into(),
            );
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()).into());
        }
        Ok(())
    }

    /// Validate that credentials are present
    pub fn validate_auth(&self) -> Result<(&str, &str)> {
        let access = self
            .access_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingAccessKey)?;
        let secret = self
            .secret_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingSecretKey)?;
        Ok((access, secret))
    }

    /// Base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
