//! Settings facade consumed by the process that launches the backend.
//!
//! `SettingsStore` owns the config and secret stores for one configuration
//! directory. There is no global instance: whoever controls the backend's
//! lifecycle constructs it and hands out references.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use deskvault_core::{
    config::{AppConfig, DesktopSettings},
    secrets::{map_secrets_to_server_env, AuditSink, SecretCrypto, SecretMetadata, SecretStatus},
};
use deskvault_storage::{ConfigStore, ConfigStoreError, SecretStore, SecretStoreError};
use thiserror::Error;
use tracing::{debug, instrument};

mod env;

pub use env::{AppDirs, DEV_SERVER_SECRET, HOST, SERVER_SECRET_KEY};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] ConfigStoreError),
    #[error(transparent)]
    Secrets(#[from] SecretStoreError),
}

pub struct SettingsStore<C: SecretCrypto> {
    config: ConfigStore,
    secrets: SecretStore<C>,
}

impl<C: SecretCrypto> SettingsStore<C> {
    /// Open both stores in `config_dir`, auditing secrets through `tracing`.
    pub fn open(config_dir: impl AsRef<Path>, crypto: C) -> Result<Self, SettingsError> {
        let config_dir = config_dir.as_ref();
        Ok(Self {
            config: ConfigStore::open(config_dir)?,
            secrets: SecretStore::open(config_dir, crypto)?,
        })
    }

    pub fn open_with_audit(
        config_dir: impl AsRef<Path>,
        crypto: C,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, SettingsError> {
        let config_dir = config_dir.as_ref();
        Ok(Self {
            config: ConfigStore::open(config_dir)?,
            secrets: SecretStore::open_with_audit(config_dir, crypto, audit)?,
        })
    }

    pub fn get_config(&self) -> AppConfig {
        self.config.config().clone()
    }

    pub fn save_config(&mut self, next: AppConfig) -> Result<AppConfig, SettingsError> {
        Ok(self.config.save_config(next)?)
    }

    pub fn get_desktop_settings(&self) -> DesktopSettings {
        self.config.config().desktop.clone()
    }

    /// Replace the desktop section, keeping the rest of the config.
    pub fn save_desktop_settings(
        &mut self,
        next: DesktopSettings,
    ) -> Result<DesktopSettings, SettingsError> {
        let config = AppConfig {
            desktop: next,
            ..self.get_config()
        };
        Ok(self.save_config(config)?.desktop)
    }

    pub fn upsert_secret(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        Ok(self.secrets.upsert(key, value)?)
    }

    pub fn remove_secret(&mut self, key: &str) -> Result<(), SettingsError> {
        Ok(self.secrets.remove(key)?)
    }

    pub fn has_secret(&self, key: &str) -> bool {
        self.secrets.contains(key)
    }

    pub fn secret_status(&self) -> SecretStatus {
        self.secrets.get_status()
    }

    /// Secret listing for the settings UI; values are never included.
    pub fn list_secrets(&self) -> Vec<SecretMetadata> {
        self.secrets.list_metadata()
    }

    /// Environment for the backend process.
    ///
    /// Layers, later overriding earlier: `base_env`, runtime values (host,
    /// port, directories), config flags, secret-derived variables.
    /// `SERVER_SECRET_KEY` is always present and non-empty.
    #[instrument(skip(self, base_env, dirs))]
    pub fn build_server_env<I, K, V>(
        &self,
        base_env: I,
        dirs: &AppDirs,
        port: u16,
    ) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let base_env: BTreeMap<String, String> = base_env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let secret_env = map_secrets_to_server_env(self.secrets.get_all_secrets());
        let server_secret = env::resolve_server_secret(&secret_env, &base_env);

        let mut merged = base_env;
        for (name, value) in env::runtime_env(dirs, port) {
            merged.insert(name.to_string(), value);
        }
        for (name, value) in env::config_env(self.config.config()) {
            merged.insert(name.to_string(), value);
        }
        let secret_count = secret_env.len();
        merged.extend(secret_env);
        merged.insert(SERVER_SECRET_KEY.to_string(), server_secret);

        debug!(vars = merged.len(), secret_vars = secret_count, "server env built");
        merged
    }
}
