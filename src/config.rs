//! Configuration file parsing for mdpaste.
//!
//! Reads static configuration from `~/.mdpaste/config.toml` and provides
//! defaults for missing fields. User preferences edited in the app live in
//! a separate file, see [`Config::preferences_path`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Shortest refresh interval accepted from the config file.
const MIN_REFRESH_INTERVAL_MS: u64 = 100;

/// Menu bar configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MenubarConfig {
    /// Title shown in the menu bar
    pub title: String,
    /// How often the menu is refreshed, in milliseconds
    pub refresh_interval_ms: u64,
}

impl Default for MenubarConfig {
    fn default() -> Self {
        Self {
            title: "MD".to_string(),
            refresh_interval_ms: 1000,
        }
    }
}

impl MenubarConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(MIN_REFRESH_INTERVAL_MS))
    }
}

/// Main configuration struct for mdpaste.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Menu bar configuration
    pub menubar: MenubarConfig,
}

impl Config {
    /// Load configuration from `~/.mdpaste/config.toml`.
    ///
    /// - If the file doesn't exist, returns default configuration.
    /// - If the file contains invalid TOML, logs a warning and returns default.
    /// - If some fields are missing, uses defaults for those fields.
    pub fn load() -> Config {
        let config_path = match Self::config_path() {
            Some(path) => path,
            None => {
                tracing::warn!("Could not determine home directory, using default config");
                return Config::default();
            }
        };

        if !config_path.exists() {
            return Config::default();
        }

        match fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!(
                    "Invalid TOML in {}: {}, using default config",
                    config_path.display(),
                    e
                );
                Config::default()
            }),
            Err(e) => {
                tracing::warn!(
                    "Could not read {}: {}, using default config",
                    config_path.display(),
                    e
                );
                Config::default()
            }
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        Ok(config)
    }

    /// Returns the path to the config file: `~/.mdpaste/config.toml`
    fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".mdpaste").join("config.toml"))
    }

    /// Returns the preferences file: `~/.mdpaste/preferences.toml`
    ///
    /// Respects `MDPASTE_PREFS_PATH` env var override for test isolation.
    pub fn preferences_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("MDPASTE_PREFS_PATH") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".mdpaste").join("preferences.toml"))
    }
}
