mod cli;
mod config;
mod storage;

use std::{
    collections::{BTreeMap, BTreeSet},
    io::{self, BufRead},
    path::Path,
    process,
};

use crate::cli::{CliConfigCommand, Command, ConfigCommand, DesktopField, SecretCommand};
use clap::Parser;
use color_eyre::{eyre::bail, Result};
use deskvault_core::{
    config::DesktopSettings,
    secrets::{env_name_for, SecretCrypto},
};
use deskvault_settings::{AppDirs, SettingsStore, SERVER_SECRET_KEY};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MASK: &str = "********";

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let flag_dir = cli.config_dir.as_deref();

    match cli.command {
        Command::CliConfig(CliConfigCommand::Init) => init_config()?,
        Command::Status => {
            let (store, _) = open(flag_dir, &config)?;
            print_status(&store);
        }
        Command::Config(ConfigCommand::Show) => {
            let (store, _) = open(flag_dir, &config)?;
            println!("{}", serde_json::to_string_pretty(&store.get_config())?);
        }
        Command::Config(ConfigCommand::SetDesktop { field, value }) => {
            let (mut store, _) = open(flag_dir, &config)?;
            set_desktop(&mut store, field, &value)?;
        }
        Command::Secret(cmd) => {
            let (mut store, _) = open(flag_dir, &config)?;
            handle_secret(&mut store, cmd)?;
        }
        Command::Env { port } => {
            let (store, dirs) = open(flag_dir, &config)?;
            let env = store.build_server_env(inherited_env(), &dirs, port.unwrap_or(config.port()));
            print!("{}", render_env(&env, &masked_names(&store)));
        }
        Command::Run { port, program } => {
            let (store, dirs) = open(flag_dir, &config)?;
            let code = run_program(&store, &dirs, port.unwrap_or(config.port()), &program)?;
            if code != 0 {
                process::exit(code);
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn open(flag_dir: Option<&Path>, config: &config::CliConfig) -> Result<(storage::VaultStore, AppDirs)> {
    let dirs = storage::app_dirs(config)?;
    let vault_dir = storage::vault_dir(flag_dir, config, &dirs);
    Ok((storage::open_vault(&vault_dir, config)?, dirs))
}

fn init_config() -> Result<()> {
    let path = config::write_default_if_missing(&config::CliConfig::starter())?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

fn print_status<C: SecretCrypto>(store: &SettingsStore<C>) {
    let status = store.secret_status();
    println!("Backend: {}", status.backend);
    println!("Initialized: {}", status.initialized);
}

fn set_desktop<C: SecretCrypto>(
    store: &mut SettingsStore<C>,
    field: DesktopField,
    value: &str,
) -> Result<()> {
    let mut desktop = store.get_desktop_settings();
    apply_desktop_field(&mut desktop, field, value)?;
    let saved = store.save_desktop_settings(desktop)?;
    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}

fn apply_desktop_field(desktop: &mut DesktopSettings, field: DesktopField, value: &str) -> Result<()> {
    match field {
        DesktopField::ShowMenuBarIcon => desktop.show_menu_bar_icon = parse_flag(value)?,
        DesktopField::ShowDockIcon => desktop.show_dock_icon = parse_flag(value)?,
        DesktopField::SpellcheckEnabled => desktop.spellcheck_enabled = parse_flag(value)?,
        DesktopField::EnableWakelock => desktop.enable_wakelock = parse_flag(value)?,
        DesktopField::OpenSettingsShortcut => {
            desktop.keyboard_shortcuts.open_settings = value.to_string()
        }
        DesktopField::NewSessionShortcut => {
            desktop.keyboard_shortcuts.new_session = value.to_string()
        }
    }
    Ok(())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

fn handle_secret<C: SecretCrypto>(store: &mut SettingsStore<C>, cmd: SecretCommand) -> Result<()> {
    match cmd {
        SecretCommand::Set { key, value } => {
            let value = match value {
                Some(value) => value,
                None => read_secret_line(io::stdin().lock())?,
            };
            store.upsert_secret(&key, &value)?;
            info!("secret stored");
            println!("Stored {}", key.trim());
        }
        SecretCommand::Rm { key } => {
            if !store.has_secret(&key) {
                println!("No secret named {}", key.trim());
                return Ok(());
            }
            store.remove_secret(&key)?;
            println!("Removed {}", key.trim());
        }
        SecretCommand::List => {
            for meta in store.list_secrets() {
                println!("{}\t{}\t{}", meta.key, meta.scope, meta.updated_at.to_rfc3339());
            }
        }
    }
    Ok(())
}

fn read_secret_line(mut input: impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

fn inherited_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

/// Variable names whose values come from stored secrets.
fn masked_names<C: SecretCrypto>(store: &SettingsStore<C>) -> BTreeSet<String> {
    store
        .list_secrets()
        .iter()
        .filter_map(|meta| env_name_for(&meta.key))
        .chain([SERVER_SECRET_KEY.to_string()])
        .collect()
}

fn render_env(env: &BTreeMap<String, String>, masked: &BTreeSet<String>) -> String {
    let mut out = String::new();
    for (name, value) in env {
        let shown = if masked.contains(name) { MASK } else { value.as_str() };
        out.push_str(&format!("{name}={shown}\n"));
    }
    out
}

fn run_program<C: SecretCrypto>(
    store: &SettingsStore<C>,
    dirs: &AppDirs,
    port: u16,
    program: &[String],
) -> Result<i32> {
    let Some((exe, args)) = program.split_first() else {
        bail!("no program given");
    };
    let env = store.build_server_env(inherited_env(), dirs, port);
    info!(program = %exe, port, "starting backend");
    let status = process::Command::new(exe)
        .args(args)
        .env_clear()
        .envs(&env)
        .status()
        .map_err(|e| color_eyre::eyre::eyre!("failed to start {exe}: {e}"))?;
    Ok(status.code().unwrap_or(1))
}
