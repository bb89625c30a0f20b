//! Application configuration layered from defaults, a TOML file and the
//! environment.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory under the user's config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "roulette";
/// Name of the configuration file.
pub const CONFIG_FILE: &str = "config.toml";
/// Prefix for environment overrides, e.g. `ROULETTE_SEED=42` or
/// `ROULETTE_REMOTE__URL=...`.
pub const ENV_PREFIX: &str = "ROULETTE";

const DEFAULT_CONFIG: &str = r#"# Creature roulette configuration.
#
# player_id = "local-player"
# nickname = "Trainer"
# base_free_spins = 5
# capture_xp = 25
# seed = 42
#
# Uncomment to play against a hosted backend instead of local files.
# [remote]
# url = "https://project.example.co"
# api_key = "public-anon-key"
# access_token = "user-session-jwt"
"#;

/// Settings for the hosted backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the project, without the `/rest/v1` suffix.
    pub url: String,
    /// Public API key sent as the `apikey` header.
    pub api_key: String,
    /// Session token for the signed-in player; falls back to the API key.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Where local profiles and logs are written.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Identifier of the player this client acts for.
    #[serde(default = "default_player_id")]
    pub player_id: String,
    /// Display name for new profiles.
    #[serde(default = "default_nickname")]
    pub nickname: String,
    /// Free spins granted to a new profile and restored on every reset.
    #[serde(default = "default_base_free_spins")]
    pub base_free_spins: u32,
    /// Experience awarded per capture.
    #[serde(default = "default_capture_xp")]
    pub capture_xp: u64,
    /// Fixed RNG seed; the OS seeds the generator when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Hosted backend settings. Local files are used when absent.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            player_id: default_player_id(),
            nickname: default_nickname(),
            base_free_spins: default_base_free_spins(),
            capture_xp: default_capture_xp(),
            seed: None,
            remote: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from `path` (optional) plus `ROULETTE_*` variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Directory holding per-player profile files.
    pub fn profile_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }

    /// Directory the binary writes logs into.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Location of the configuration file under the user's config directory.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Write a commented default configuration file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    ensure_default_config_at(config_path())
}

/// Variant of [`ensure_default_config`] for an explicit path.
pub fn ensure_default_config_at(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

fn default_player_id() -> String {
    "local-player".to_string()
}

fn default_nickname() -> String {
    "Trainer".to_string()
}

fn default_base_free_spins() -> u32 {
    5
}

fn default_capture_xp() -> u64 {
    25
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_is_written_once_and_parses() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        ensure_default_config_at(&path)?;
        assert!(path.exists());

        fs::write(&path, "base_free_spins = 9\n")?;
        ensure_default_config_at(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "base_free_spins = 9\n");
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
player_id = "ash"
capture_xp = 40
seed = 7

[remote]
url = "https://example.test"
api_key = "anon"
"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.player_id, "ash");
        assert_eq!(config.capture_xp, 40);
        assert_eq!(config.base_free_spins, 5);
        assert_eq!(config.seed, Some(7));
        let remote = config.remote.expect("remote section");
        assert_eq!(remote.url, "https://example.test");
        assert_eq!(remote.access_token, None);
        Ok(())
    }

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.nickname, "Trainer");
        assert!(config.remote.is_none());
        Ok(())
    }
}
