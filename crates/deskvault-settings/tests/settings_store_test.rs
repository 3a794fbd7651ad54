use std::{fs, sync::Arc};

use deskvault_core::{
    config::{AppConfig, ResponseStyle},
    secrets::{AuditAction, Backend, MaskingCrypto, MemoryAuditSink, UnavailableCrypto},
};
use deskvault_settings::{AppDirs, SettingsStore, DEV_SERVER_SECRET, SERVER_SECRET_KEY};

fn dirs() -> AppDirs {
    AppDirs::under("/tmp/agent")
}

#[test]
fn desktop_settings_persist_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SettingsStore::open(dir.path(), MaskingCrypto).expect("open");
    let mut desktop = store.get_desktop_settings();
    desktop.show_menu_bar_icon = false;
    store.save_desktop_settings(desktop).expect("save");

    let restored = SettingsStore::open(dir.path(), MaskingCrypto).expect("reopen");
    assert!(!restored.get_desktop_settings().show_menu_bar_icon);
}

#[test]
fn saving_desktop_settings_keeps_renderer_prefs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SettingsStore::open(dir.path(), MaskingCrypto).expect("open");
    let mut config = store.get_config();
    config.renderer_prefs.response_style = ResponseStyle::Concise;
    store.save_config(config).expect("save config");

    let mut desktop = store.get_desktop_settings();
    desktop.keyboard_shortcuts.open_settings = String::new();
    desktop.enable_wakelock = true;
    let saved = store.save_desktop_settings(desktop).expect("save desktop");

    assert_eq!(saved.keyboard_shortcuts.open_settings, "Ctrl+,");
    let config = store.get_config();
    assert!(config.desktop.enable_wakelock);
    assert_eq!(config.renderer_prefs.response_style, ResponseStyle::Concise);
}

#[test]
fn server_env_includes_settings_and_secrets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SettingsStore::open(dir.path(), MaskingCrypto).expect("open");
    store
        .upsert_secret("provider.openai.api_key", "secret-1")
        .expect("upsert");
    let mut desktop = store.get_desktop_settings();
    desktop.spellcheck_enabled = false;
    store.save_desktop_settings(desktop).expect("save");

    let env = store.build_server_env([("PATH", "/usr/bin")], &dirs(), 43111);

    assert_eq!(env["HOST"], "127.0.0.1");
    assert_eq!(env["PORT"], "43111");
    assert_eq!(env["PATH"], "/usr/bin");
    assert_eq!(env["PROVIDER_OPENAI_API_KEY"], "secret-1");
    assert_eq!(env["AGENT_DESKTOP_SPELLCHECK_ENABLED"], "0");
    assert_eq!(env["AGENT_CONFIG_DIR"], "/tmp/agent/config");
    assert_eq!(env[SERVER_SECRET_KEY], DEV_SERVER_SECRET);
}

#[test]
fn stored_server_secret_wins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SettingsStore::open(dir.path(), MaskingCrypto).expect("open");
    store.upsert_secret("server.secret_key", "abc").expect("upsert");

    let env = store.build_server_env(
        [(SERVER_SECRET_KEY, "inherited"), ("PORT", "1")],
        &dirs(),
        4000,
    );

    assert_eq!(env[SERVER_SECRET_KEY], "abc");
    assert_eq!(env["PORT"], "4000");
}

#[test]
fn inherited_server_secret_used_when_none_stored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SettingsStore::open(dir.path(), MaskingCrypto).expect("open");

    let inherited = store.build_server_env([(SERVER_SECRET_KEY, "from-shell")], &dirs(), 4000);
    assert_eq!(inherited[SERVER_SECRET_KEY], "from-shell");

    let blank = store.build_server_env([(SERVER_SECRET_KEY, "")], &dirs(), 4000);
    assert_eq!(blank[SERVER_SECRET_KEY], DEV_SERVER_SECRET);

    let empty = store.build_server_env(Vec::<(String, String)>::new(), &dirs(), 4000);
    assert_eq!(empty[SERVER_SECRET_KEY], DEV_SERVER_SECRET);
}

#[test]
fn secrets_override_config_flags() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SettingsStore::open(dir.path(), MaskingCrypto).expect("open");
    store
        .upsert_secret("agent.desktop.show_pricing", "custom")
        .expect("upsert");

    let env = store.build_server_env(Vec::<(String, String)>::new(), &dirs(), 4000);
    // Falls through to the catch-all rule.
    assert_eq!(env["APP_SECRET_AGENT_DESKTOP_SHOW_PRICING"], "custom");
    assert_eq!(env["AGENT_DESKTOP_SHOW_PRICING"], "1");
}

#[test]
fn listing_never_exposes_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SettingsStore::open(dir.path(), MaskingCrypto).expect("open");
    store
        .upsert_secret("sftp.password", "hunter2")
        .expect("upsert");

    let listed = serde_json::to_string(&store.list_secrets()).expect("serialize");
    assert!(listed.contains("sftp.password"));
    assert!(!listed.contains("hunter2"));
    assert!(store.secret_status().initialized);
}

#[test]
fn unavailable_crypto_uses_fallback_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SettingsStore::open(dir.path(), UnavailableCrypto).expect("open");
    assert_eq!(store.secret_status().backend, Backend::FallbackEnvFile);

    store.upsert_secret("sftp.password", "hunter2").expect("upsert");
    let contents = fs::read_to_string(dir.path().join("secrets.env")).expect("read fallback");
    assert!(contents.contains("hunter2"));
    assert!(!dir.path().join("secrets.enc").exists());

    store.remove_secret("sftp.password").expect("remove");
    let reopened = SettingsStore::open(dir.path(), UnavailableCrypto).expect("reopen");
    assert!(reopened.list_secrets().is_empty());
}

#[test]
fn building_env_audits_a_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = MemoryAuditSink::new();
    let mut store =
        SettingsStore::open_with_audit(dir.path(), MaskingCrypto, Arc::new(sink.clone()))
            .expect("open");
    store.upsert_secret("mcp.system.github.token", "ghp").expect("upsert");

    let env = store.build_server_env(Vec::<(String, String)>::new(), &dirs(), 4000);
    assert_eq!(env["MCP_SYSTEM_GITHUB_TOKEN"], "ghp");

    let actions: Vec<AuditAction> = sink.entries().iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Upsert, AuditAction::Read]);
}

#[test]
fn fresh_store_returns_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SettingsStore::open(dir.path(), MaskingCrypto).expect("open");
    assert_eq!(store.get_config(), AppConfig::default());
    assert!(!store.secret_status().initialized);
}

#[test]
fn failed_secret_write_never_reaches_server_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SettingsStore::open(dir.path(), UnavailableCrypto).expect("open");
    fs::create_dir(dir.path().join("secrets.env")).expect("block fallback file");

    assert!(store.upsert_secret("server.secret_key", "abc").is_err());

    assert!(!store.has_secret("server.secret_key"));
    assert!(!store.secret_status().initialized);
    let env = store.build_server_env(Vec::<(String, String)>::new(), &dirs(), 4000);
    assert_eq!(env[SERVER_SECRET_KEY], DEV_SERVER_SECRET);
}
