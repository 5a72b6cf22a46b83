//! CLI command handlers.

use anyhow::{Context, Result};
use cartchat_core::{AgentClient, Config};

pub mod ask;
pub mod chat;
pub mod config;

/// Effective config plus the `--base-url` flag, if given.
pub struct Connection {
    pub config: Config,
    pub base_url_override: Option<String>,
}

impl Connection {
    /// Builds the agent client; the flag wins over env and config.
    pub fn client(&self) -> Result<AgentClient> {
        let client = AgentClient::from_config(&self.config).context("resolve agent endpoint")?;
        match self.base_url_override.as_deref() {
            Some(url) => client.with_base_url(url),
            None => Ok(client),
        }
    }
}
