//! Versioned application config and its field-by-field normalization.
//!
//! Everything read from disk goes through the `normalize_*` functions below.
//! They never fail: a field with the wrong type falls back to its default
//! without touching its siblings, and only a non-object input is replaced
//! wholesale.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current schema version written to disk.
pub const CONFIG_SCHEMA_VERSION: i64 = 1;

/// Keyboard shortcuts exposed in the desktop shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardShortcuts {
    pub open_settings: String,
    pub new_session: String,
}

impl Default for KeyboardShortcuts {
    fn default() -> Self {
        Self {
            open_settings: "Ctrl+,".to_string(),
            new_session: "Ctrl+N".to_string(),
        }
    }
}

/// Desktop-shell toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopSettings {
    pub show_menu_bar_icon: bool,
    pub show_dock_icon: bool,
    pub spellcheck_enabled: bool,
    pub enable_wakelock: bool,
    pub keyboard_shortcuts: KeyboardShortcuts,
}

impl Default for DesktopSettings {
    fn default() -> Self {
        Self {
            show_menu_bar_icon: true,
            show_dock_icon: true,
            spellcheck_enabled: true,
            enable_wakelock: false,
            keyboard_shortcuts: KeyboardShortcuts::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSharingConfig {
    pub enabled: bool,
}

/// How verbose the assistant's answers should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    Concise,
    #[default]
    Balanced,
    Detailed,
}

impl ResponseStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStyle::Concise => "concise",
            ResponseStyle::Balanced => "balanced",
            ResponseStyle::Detailed => "detailed",
        }
    }

    /// Parse the literal form; anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "concise" => Some(ResponseStyle::Concise),
            "balanced" => Some(ResponseStyle::Balanced),
            "detailed" => Some(ResponseStyle::Detailed),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferences owned by the renderer (UI) process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererPrefs {
    pub session_sharing_config: SessionSharingConfig,
    pub response_style: ResponseStyle,
    pub show_pricing: bool,
}

impl Default for RendererPrefs {
    fn default() -> Self {
        Self {
            session_sharing_config: SessionSharingConfig::default(),
            response_style: ResponseStyle::default(),
            show_pricing: true,
        }
    }
}

/// Unified, versioned application config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema_version: i64,
    pub desktop: DesktopSettings,
    pub renderer_prefs: RendererPrefs,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            desktop: DesktopSettings::default(),
            renderer_prefs: RendererPrefs::default(),
        }
    }
}

impl AppConfig {
    /// Normalize an already-typed config. Only the shortcut strings can be
    /// invalid once the types line up.
    pub fn normalized(mut self) -> Self {
        self.desktop = self.desktop.normalized();
        self
    }
}

impl DesktopSettings {
    pub fn normalized(mut self) -> Self {
        let defaults = KeyboardShortcuts::default();
        if self.keyboard_shortcuts.open_settings.is_empty() {
            self.keyboard_shortcuts.open_settings = defaults.open_settings;
        }
        if self.keyboard_shortcuts.new_session.is_empty() {
            self.keyboard_shortcuts.new_session = defaults.new_session;
        }
        self
    }
}

/// Normalize an untrusted JSON value into a complete [`AppConfig`].
pub fn normalize_app_config(value: &Value) -> AppConfig {
    let Some(obj) = value.as_object() else {
        return AppConfig::default();
    };

    AppConfig {
        schema_version: as_integer(obj.get("schemaVersion")).unwrap_or(CONFIG_SCHEMA_VERSION),
        desktop: normalize_desktop_settings(obj.get("desktop").unwrap_or(&Value::Null)),
        renderer_prefs: normalize_renderer_prefs(
            obj.get("rendererPrefs").unwrap_or(&Value::Null),
        ),
    }
}

/// Normalize an untrusted JSON value into [`DesktopSettings`].
pub fn normalize_desktop_settings(value: &Value) -> DesktopSettings {
    let defaults = DesktopSettings::default();
    let Some(obj) = value.as_object() else {
        return defaults;
    };

    let empty = Map::new();
    let shortcuts = obj
        .get("keyboardShortcuts")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    DesktopSettings {
        show_menu_bar_icon: as_bool(obj.get("showMenuBarIcon"), defaults.show_menu_bar_icon),
        show_dock_icon: as_bool(obj.get("showDockIcon"), defaults.show_dock_icon),
        spellcheck_enabled: as_bool(obj.get("spellcheckEnabled"), defaults.spellcheck_enabled),
        enable_wakelock: as_bool(obj.get("enableWakelock"), defaults.enable_wakelock),
        keyboard_shortcuts: KeyboardShortcuts {
            open_settings: as_non_empty_string(
                shortcuts.get("openSettings"),
                defaults.keyboard_shortcuts.open_settings,
            ),
            new_session: as_non_empty_string(
                shortcuts.get("newSession"),
                defaults.keyboard_shortcuts.new_session,
            ),
        },
    }
}

/// Normalize an untrusted JSON value into [`RendererPrefs`].
pub fn normalize_renderer_prefs(value: &Value) -> RendererPrefs {
    let defaults = RendererPrefs::default();
    let Some(obj) = value.as_object() else {
        return defaults;
    };

    let sharing_enabled = obj
        .get("sessionSharingConfig")
        .and_then(Value::as_object)
        .and_then(|sharing| sharing.get("enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(defaults.session_sharing_config.enabled);

    RendererPrefs {
        session_sharing_config: SessionSharingConfig {
            enabled: sharing_enabled,
        },
        response_style: obj
            .get("responseStyle")
            .and_then(Value::as_str)
            .and_then(ResponseStyle::parse)
            .unwrap_or(defaults.response_style),
        show_pricing: as_bool(obj.get("showPricing"), defaults.show_pricing),
    }
}

fn as_bool(value: Option<&Value>, fallback: bool) -> bool {
    value.and_then(Value::as_bool).unwrap_or(fallback)
}

fn as_non_empty_string(value: Option<&Value>, fallback: String) -> String {
    match value.and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => fallback,
    }
}

// JSON has one number type; `2.0` is still an integer.
fn as_integer(value: Option<&Value>) -> Option<i64> {
    let Value::Number(number) = value? else {
        return None;
    };
    if let Some(int) = number.as_i64() {
        return Some(int);
    }
    number
        .as_f64()
        .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
        .map(|float| float as i64)
}
