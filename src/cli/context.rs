//! Command execution context
//!
//! Loads configuration and logs in once, so handlers start from an
//! authenticated client.

use std::sync::Arc;

use crate::cli::args::GlobalOptions;
use crate::client::InventoryClient;
use crate::config::Config;
use crate::error::Result;

/// Context for command execution containing config and client.
pub struct CommandContext {
    /// Loaded and validated configuration
    pub config: Config,
    /// Authenticated API client (Arc-wrapped for the collection fan-out)
    pub client: Arc<InventoryClient>,
}

impl CommandContext {
    /// Load config, apply overrides, validate credentials and log in.
    ///
    /// # Errors
    /// Returns error if config cannot be loaded, credentials are missing or
    /// the login is rejected.
    pub async fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = opts.load_config()?;
        let client = InventoryClient::login(&config).await?;

        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }
}
