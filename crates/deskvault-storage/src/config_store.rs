use std::{
    fs, io,
    path::{Path, PathBuf},
};

use deskvault_core::config::{
    normalize_app_config, normalize_desktop_settings, normalize_renderer_prefs, AppConfig,
    CONFIG_SCHEMA_VERSION,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::atomic::write_atomic;

/// Unified document: `{"config": AppConfig}`.
pub const UNIFIED_FILE: &str = "desktop-config.json";
/// Plain `AppConfig` copy kept in sync for external inspection.
pub const SNAPSHOT_FILE: &str = "config.json";
/// Pre-unification desktop settings (read once during migration).
pub const LEGACY_SETTINGS_FILE: &str = "settings.json";
/// Pre-unification renderer preferences (read once during migration).
pub const LEGACY_RENDERER_PREFS_FILE: &str = "renderer-prefs.json";

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("config io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct UnifiedDocument<'a> {
    config: &'a AppConfig,
}

/// Versioned application config persisted under one directory.
///
/// State is loaded once at construction and every save rewrites both the
/// unified document and the plain snapshot atomically.
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    config: AppConfig,
}

impl ConfigStore {
    /// Load (or migrate) the config in `dir` and write back its normalized form.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ConfigStoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| ConfigStoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let config = match read_unified(&dir.join(UNIFIED_FILE)) {
            Some(stored) => normalize_app_config(&stored),
            None => {
                debug!("no unified config found, migrating legacy files");
                migrate_legacy(&dir)
            }
        };

        let store = Self { dir, config };
        store.persist(&store.config)?;
        Ok(store)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Normalize and persist `next`, returning what was stored.
    #[instrument(skip_all)]
    pub fn save_config(&mut self, next: AppConfig) -> Result<AppConfig, ConfigStoreError> {
        let normalized = next.normalized();
        self.persist(&normalized)?;
        self.config = normalized.clone();
        Ok(normalized)
    }

    fn persist(&self, config: &AppConfig) -> Result<(), ConfigStoreError> {
        let unified = serde_json::to_vec_pretty(&UnifiedDocument { config })?;
        let snapshot = serde_json::to_vec_pretty(config)?;
        self.write(UNIFIED_FILE, &unified)?;
        self.write(SNAPSHOT_FILE, &snapshot)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), ConfigStoreError> {
        let path = self.dir.join(name);
        write_atomic(&path, bytes).map_err(|source| ConfigStoreError::Io { path, source })
    }
}

/// The stored `config` member, if the unified document holds a usable one.
/// Missing, unreadable, or empty documents all mean "not migrated yet".
fn read_unified(path: &Path) -> Option<Value> {
    let mut document = read_json(path)?;
    match document.get_mut("config").map(Value::take) {
        Some(Value::Object(map)) if !map.is_empty() => Some(Value::Object(map)),
        _ => None,
    }
}

fn migrate_legacy(dir: &Path) -> AppConfig {
    let desktop = read_json(&dir.join(LEGACY_SETTINGS_FILE))
        .map(|raw| normalize_desktop_settings(&raw))
        .unwrap_or_default();
    let renderer_prefs = read_json(&dir.join(LEGACY_RENDERER_PREFS_FILE))
        .map(|raw| normalize_renderer_prefs(&raw))
        .unwrap_or_default();

    AppConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        desktop,
        renderer_prefs,
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            debug!(path = %path.display(), "config file unreadable: {err}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(path = %path.display(), "config file is not valid json: {err}");
            None
        }
    }
}
