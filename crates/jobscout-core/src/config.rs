//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, the last used username, where the token is kept and
//! how long the cached profile stays usable.
//!
//! Configuration is stored at `~/.config/jobscout/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_BASE_URL;
use crate::auth::storage::DEFAULT_PROFILE_TTL_MINUTES;
use crate::auth::{FileStorage, KeyringStorage, SessionStorage};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "jobscout";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the configured base URL
pub const API_URL_ENV: &str = "JOBSCOUT_API_URL";

/// Where the bearer token is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub last_username: Option<String>,
    #[serde(default)]
    pub token_backend: TokenBackend,
    #[serde(default)]
    pub profile_cache_ttl_minutes: Option<i64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            debug!(?path, "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Base URL, in order of precedence: environment, config file, default.
    pub fn base_url(&self) -> String {
        Self::resolve_base_url(std::env::var(API_URL_ENV).ok(), self.api_base_url.as_deref())
    }

    fn resolve_base_url(env: Option<String>, configured: Option<&str>) -> String {
        env.filter(|url| !url.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn profile_ttl(&self) -> Duration {
        let minutes = self
            .profile_cache_ttl_minutes
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_PROFILE_TTL_MINUTES);
        Duration::minutes(minutes)
    }

    /// Open the storage backend selected by `token_backend`.
    pub fn open_storage(&self) -> Result<Box<dyn SessionStorage>> {
        let cache_dir = self.cache_dir()?;
        let storage: Box<dyn SessionStorage> = match self.token_backend {
            TokenBackend::File => Box::new(
                FileStorage::new(self.data_dir()?, cache_dir, self.profile_ttl())
                    .context("Failed to open session storage")?,
            ),
            TokenBackend::Keyring => Box::new(
                KeyringStorage::new(cache_dir, self.profile_ttl())
                    .context("Failed to open session storage")?,
            ),
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_precedence() {
        assert_eq!(
            Config::resolve_base_url(Some("http://env.test".into()), Some("http://file.test")),
            "http://env.test"
        );
        assert_eq!(
            Config::resolve_base_url(None, Some("http://file.test")),
            "http://file.test"
        );
        assert_eq!(Config::resolve_base_url(Some("  ".into()), None), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_profile_ttl_default_and_override() {
        let mut config = Config::default();
        assert_eq!(config.profile_ttl(), Duration::minutes(DEFAULT_PROFILE_TTL_MINUTES));

        config.profile_cache_ttl_minutes = Some(5);
        assert_eq!(config.profile_ttl(), Duration::minutes(5));

        config.profile_cache_ttl_minutes = Some(0);
        assert_eq!(config.profile_ttl(), Duration::minutes(DEFAULT_PROFILE_TTL_MINUTES));
    }

    #[test]
    fn test_config_parses_partial_file() {
        let config: Config = serde_json::from_str(r#"{"token_backend":"keyring"}"#)
            .expect("config should parse");
        assert_eq!(config.token_backend, TokenBackend::Keyring);
        assert!(config.api_base_url.is_none());

        let empty: Config = serde_json::from_str("{}").expect("empty config should parse");
        assert_eq!(empty.token_backend, TokenBackend::File);
    }
}
