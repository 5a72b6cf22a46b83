//! Configuration management for cartchat.
//!
//! Loads configuration from ${CARTCHAT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Session id sent when no user id is configured.
pub const GUEST_SESSION_ID: &str = "guest";

pub mod paths {
    //! Path resolution for cartchat configuration.
    //!
    //! CARTCHAT_HOME resolution order:
    //! 1. CARTCHAT_HOME environment variable (if set)
    //! 2. ~/.config/cartchat (default)

    use std::path::PathBuf;

    /// Returns the cartchat home directory.
    ///
    /// Checks CARTCHAT_HOME env var first, falls back to ~/.config/cartchat,
    /// and finally to a relative `.cartchat` when no home directory exists.
    pub fn cartchat_home() -> PathBuf {
        if let Ok(home) = std::env::var("CARTCHAT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".cartchat"),
            |h| h.join(".config").join("cartchat"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        cartchat_home().join("config.toml")
    }
}

/// Identity and endpoint settings for talking to the agent backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub run_path: String,
    pub agent_name: String,
    pub mode: String,
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            run_path: Self::DEFAULT_RUN_PATH.to_string(),
            agent_name: "router".to_string(),
            mode: "sync".to_string(),
            tenant_id: "thewholetruthfoods.com".to_string(),
            user_id: None,
        }
    }
}

impl Config {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8080";
    pub const DEFAULT_RUN_PATH: &'static str = "/api/runs";
    pub const BASE_URL_ENV: &'static str = "CARTCHAT_BASE_URL";

    /// Loads configuration from the default path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default template to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;
        Ok(())
    }

    /// Renders the effective configuration as TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize config")
    }

    /// Resolves the backend base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is not a valid URL.
    pub fn resolve_base_url(&self) -> Result<String> {
        resolve_base_url(
            std::env::var(Self::BASE_URL_ENV).ok().as_deref(),
            Some(&self.base_url),
        )
    }

    /// Session id sent with every run: the configured user id, or `guest`.
    pub fn session_id(&self) -> &str {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(GUEST_SESSION_ID)
    }
}

fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

fn resolve_base_url(env_url: Option<&str>, config_url: Option<&str>) -> Result<String> {
    let chosen = [env_url, config_url]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(Config::DEFAULT_BASE_URL);

    url::Url::parse(chosen).with_context(|| format!("Invalid base URL: {chosen}"))?;
    Ok(chosen.trim_end_matches('/').to_string())
}
