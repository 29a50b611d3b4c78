//! CLI configuration at `~/.config/repolink/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use repolink_core::SyncSettings;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Environment variable overriding the stored auth token.
pub const TOKEN_ENV: &str = "REPOLINK_TOKEN";
/// Environment variable overriding the backend URL.
pub const SERVER_ENV: &str = "REPOLINK_SERVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// JSON document holding the local project registry
    pub data_path: PathBuf,

    /// Backend bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Engine settings
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Default for Config {
    fn default() -> Self {
        let data_path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repolink")
            .join("store.json");

        Self {
            data_path,
            auth_token: None,
            sync: SyncSettings::default(),
        }
    }
}

impl Config {
    /// Get the config file path (~/.config/repolink/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("repolink").join("config.toml"))
    }

    /// Load config from the default location, or defaults if there is none.
    pub fn load() -> Result<Self, CliError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), CliError> {
        let path = Self::config_path().ok_or(CliError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `REPOLINK_TOKEN` / `REPOLINK_SERVER` on top of the file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(TOKEN_ENV).ok(),
            std::env::var(SERVER_ENV).ok(),
        )
    }

    fn with_overrides(mut self, token: Option<String>, server: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.auth_token = Some(token);
        }
        if let Some(server) = server.filter(|s| !s.is_empty()) {
            self.sync.server_url = server;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolink_core::InwardGateFallback;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.data_path = dir.path().join("store.json");
        config.auth_token = Some("tok".to_string());
        config.sync.inward_gate_on_storage_error = InwardGateFallback::Strict;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_sync_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "data_path = \"/tmp/store.json\"\n\n[sync]\nserver_url = \"http://localhost:8787\"\nrace_window_ms = 5000\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sync.server_url, "http://localhost:8787");
        assert_eq!(config.sync.race_window_ms, 5000);
        assert_eq!(config.sync.request_timeout_secs, 30);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_overrides(
            Some("from-env".to_string()),
            Some("http://example.test".to_string()),
        );
        assert_eq!(config.auth_token.as_deref(), Some("from-env"));
        assert_eq!(config.sync.server_url, "http://example.test");

        let untouched = Config::default().with_overrides(Some(String::new()), None);
        assert!(untouched.auth_token.is_none());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_path = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(CliError::ConfigParse(_))
        ));
    }
}
