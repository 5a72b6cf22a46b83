//! Config command handlers.

use anyhow::{Context, Result};
use cartchat_core::config;

use super::Connection;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

/// Prints the effective configuration, including flag overrides and the
/// resolved endpoint.
pub fn show(connection: &Connection) -> Result<()> {
    let client = connection.client()?;
    print!("{}", connection.config.to_toml()?);
    println!("# endpoint: {}", client.run_url());
    println!("# session_id: {}", connection.config.session_id());
    Ok(())
}
