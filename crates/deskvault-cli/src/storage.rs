use std::path::{Path, PathBuf};

use crate::config::CliConfig;
use color_eyre::Result;
use deskvault_settings::{AppDirs, SettingsStore};
use deskvault_storage::{key_provider::KeyringProvider, KeychainCrypto};
use dirs::data_dir;
use tracing::debug;

pub type VaultStore = SettingsStore<KeychainCrypto<KeyringProvider>>;

/// Resolve the default data directory for deskvault.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("deskvault"))
}

pub fn app_dirs(config: &CliConfig) -> Result<AppDirs> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    Ok(AppDirs::under(root))
}

/// Flag, then config file, then the `config` child of the data directory.
pub fn vault_dir(flag: Option<&Path>, config: &CliConfig, dirs: &AppDirs) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| config.config_dir.clone())
        .unwrap_or_else(|| dirs.config.clone())
}

/// Open the vault with the OS keychain as encryption capability.
pub fn open_vault(vault_dir: &Path, config: &CliConfig) -> Result<VaultStore> {
    debug!(?vault_dir, "opening settings vault");
    let crypto = KeychainCrypto::new(KeyringProvider::new(
        config.keyring_service(),
        config.keyring_account(),
    ));
    Ok(SettingsStore::open(vault_dir, crypto)?)
}
