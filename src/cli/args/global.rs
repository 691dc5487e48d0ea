//! Global CLI options shared across all commands

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;

/// Global CLI options passed to all command handlers.
///
/// # Precedence
///
/// CLI flag > environment variable > config file > default. This struct
/// captures the CLI/env layer; [`GlobalOptions::load_config`] lays it over
/// the config file.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Inventory API base URL override
    pub api_url: Option<String>,

    pub access_key: Option<String>,

    pub secret_key: Option<String>,

    /// Custom config file path (defaults to ~/.invkit/config.yaml)
    pub config: Option<String>,
}

impl GlobalOptions {
    /// Create GlobalOptions from a parsed CLI struct.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            api_url: cli.api_url.clone(),
            access_key: cli.access_key.clone(),
            secret_key: cli.secret_key.clone(),
            config: cli.config.clone(),
        }
    }

    /// Get config path as `Option<&str>`.
    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    /// Load the config file and apply the flag/env overrides on top.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_at(self.config_ref())?;
        config.apply_overrides(
            self.api_url.as_deref(),
            self.access_key.as_deref(),
            self.secret_key.as_deref(),
        );
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "base_url: https://file.example\naccess_key: file-ak\nsecret_key: file-sk\nconcurrency: 3"
        )
        .unwrap();

        let opts = GlobalOptions {
            api_url: Some("http://localhost:8080".to_string()),
            access_key: Some("flag-ak".to_string()),
            config: Some(file.path().display().to_string()),
            ..Default::default()
        };
        let config = opts.load_config().unwrap();

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.access_key.as_deref(), Some("flag-ak"));
        assert_eq!(config.secret_key.as_deref(), Some("file-sk"));
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let opts = GlobalOptions {
            config: Some("/nonexistent/invkit.yaml".to_string()),
            ..Default::default()
        };
        assert!(opts.load_config().is_err());
    }
}
