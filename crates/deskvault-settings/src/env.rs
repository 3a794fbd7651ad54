//! Environment handed to the spawned backend process.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use deskvault_core::config::AppConfig;

pub const HOST: &str = "127.0.0.1";
pub const SERVER_SECRET_KEY: &str = "SERVER_SECRET_KEY";
/// Used when neither the stored secrets nor the parent environment provide a
/// backend credential.
pub const DEV_SERVER_SECRET: &str = "dev-secret";

/// Standard directories of the running application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    pub root: PathBuf,
    pub config: PathBuf,
    pub logs: PathBuf,
    pub cache: PathBuf,
}

impl AppDirs {
    /// `config`, `logs` and `cache` as children of `root`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config: root.join("config"),
            logs: root.join("logs"),
            cache: root.join("cache"),
            root,
        }
    }
}

pub(crate) fn runtime_env(dirs: &AppDirs, port: u16) -> [(&'static str, String); 6] {
    [
        ("HOST", HOST.to_string()),
        ("PORT", port.to_string()),
        ("AGENT_PATH_ROOT", path_value(&dirs.root)),
        ("AGENT_CONFIG_DIR", path_value(&dirs.config)),
        ("AGENT_LOGS_DIR", path_value(&dirs.logs)),
        ("AGENT_CACHE_DIR", path_value(&dirs.cache)),
    ]
}

pub(crate) fn config_env(config: &AppConfig) -> [(&'static str, String); 9] {
    let desktop = &config.desktop;
    let prefs = &config.renderer_prefs;
    [
        ("AGENT_DESKTOP_SHOW_MENU_BAR_ICON", flag(desktop.show_menu_bar_icon)),
        ("AGENT_DESKTOP_SHOW_DOCK_ICON", flag(desktop.show_dock_icon)),
        ("AGENT_DESKTOP_SPELLCHECK_ENABLED", flag(desktop.spellcheck_enabled)),
        ("AGENT_DESKTOP_WAKELOCK_ENABLED", flag(desktop.enable_wakelock)),
        (
            "AGENT_DESKTOP_SHORTCUT_OPEN_SETTINGS",
            desktop.keyboard_shortcuts.open_settings.clone(),
        ),
        (
            "AGENT_DESKTOP_SHORTCUT_NEW_SESSION",
            desktop.keyboard_shortcuts.new_session.clone(),
        ),
        ("AGENT_DESKTOP_RESPONSE_STYLE", prefs.response_style.to_string()),
        (
            "AGENT_DESKTOP_SESSION_SHARING",
            flag(prefs.session_sharing_config.enabled),
        ),
        ("AGENT_DESKTOP_SHOW_PRICING", flag(prefs.show_pricing)),
    ]
}

/// Secret-derived value, else a non-empty inherited value, else the dev placeholder.
pub(crate) fn resolve_server_secret(
    secret_env: &BTreeMap<String, String>,
    base_env: &BTreeMap<String, String>,
) -> String {
    [secret_env.get(SERVER_SECRET_KEY), base_env.get(SERVER_SECRET_KEY)]
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .cloned()
        .unwrap_or_else(|| DEV_SERVER_SECRET.to_string())
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
