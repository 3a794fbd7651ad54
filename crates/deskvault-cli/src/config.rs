use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

pub const DEFAULT_KEYRING_SERVICE: &str = "deskvault";
pub const DEFAULT_KEYRING_ACCOUNT: &str = "secrets-key";
pub const DEFAULT_PORT: u16 = 43111;

/// User-level CLI configuration loaded from `~/.config/deskvault/cli.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Vault directory holding the config and secret files.
    pub config_dir: Option<PathBuf>,
    /// Root for the backend's config, logs and cache directories.
    pub data_dir: Option<PathBuf>,
    pub keyring_service: Option<String>,
    pub keyring_account: Option<String>,
    /// Backend port used by `env` and `run` when `--port` is absent.
    pub port: Option<u16>,
}

impl CliConfig {
    pub fn keyring_service(&self) -> &str {
        self.keyring_service
            .as_deref()
            .unwrap_or(DEFAULT_KEYRING_SERVICE)
    }

    pub fn keyring_account(&self) -> &str {
        self.keyring_account
            .as_deref()
            .unwrap_or(DEFAULT_KEYRING_ACCOUNT)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// The file written by `cli-config init`: built-in values spelled out so
    /// they are easy to edit.
    pub fn starter() -> Self {
        Self {
            config_dir: None,
            data_dir: None,
            keyring_service: Some(DEFAULT_KEYRING_SERVICE.to_string()),
            keyring_account: Some(DEFAULT_KEYRING_ACCOUNT.to_string()),
            port: Some(DEFAULT_PORT),
        }
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<CliConfig> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<CliConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(CliConfig::default());
    }
    let cfg: CliConfig = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("deskvault").join("cli.toml"))
}

/// Write `config` to the default path unless a file is already there.
pub fn write_default_if_missing(config: &CliConfig) -> Result<PathBuf> {
    write_to_path_if_missing(config, &default_path()?)
}

fn write_to_path_if_missing(config: &CliConfig, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
