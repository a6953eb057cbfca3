//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the token storage backend, and the last
//! email used to log in.
//!
//! Configuration is stored at `~/.config/rollcall/config.json`. The base URL
//! can be overridden with `ROLLCALL_API_BASE_URL`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{open_store, TokenStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "rollcall";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the configured API base URL
pub const BASE_URL_ENV: &str = "ROLLCALL_API_BASE_URL";

/// Where the access/refresh tokens are kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub token_backend: TokenBackend,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
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

    /// Directory for the token file and logs
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// API base URL, from the environment first, then the config file
    pub fn base_url(&self) -> Result<String> {
        self.resolve_base_url(std::env::var(BASE_URL_ENV).ok())
    }

    fn resolve_base_url(&self, from_env: Option<String>) -> Result<String> {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .map(|url| url.trim().to_string())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No API base URL configured. Set {} or api_base_url in the config file",
                    BASE_URL_ENV
                )
            })
    }

    pub fn open_token_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(open_store(self.token_backend, &self.data_dir()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.api_base_url.is_none());
        assert_eq!(config.token_backend, TokenBackend::File);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_base_url: Some("https://voters.example.org".to_string()),
            token_backend: TokenBackend::Keyring,
            last_email: Some("a@x.com".to_string()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url.as_deref(), Some("https://voters.example.org"));
        assert_eq!(loaded.token_backend, TokenBackend::Keyring);
        assert_eq!(loaded.last_email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_backend_names_are_lowercase() {
        let config: Config = serde_json::from_str(r#"{"token_backend": "memory"}"#).unwrap();
        assert_eq!(config.token_backend, TokenBackend::Memory);
    }

    #[test]
    fn test_env_base_url_wins_over_file() {
        let config = Config {
            api_base_url: Some("https://file.example.org".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_base_url(Some("https://env.example.org".to_string())).unwrap(),
            "https://env.example.org"
        );
        assert_eq!(config.resolve_base_url(None).unwrap(), "https://file.example.org");
        assert_eq!(
            config.resolve_base_url(Some("  ".to_string())).unwrap(),
            "https://file.example.org"
        );
    }

    #[test]
    fn test_missing_base_url_is_an_error() {
        let err = Config::default().resolve_base_url(None).unwrap_err();
        assert!(err.to_string().contains(BASE_URL_ENV));
    }
}
