use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Manage the local config and secret vault, and launch the backend with it.
#[derive(Parser, Debug)]
#[command(
    name = "deskvault",
    about = "Local settings and secret vault for the desktop agent",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Vault directory; overrides `config_dir` from the CLI config file.
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the active secret backend and whether any secret is stored.
    Status,
    /// Inspect or change the application config.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage stored secrets. Values are never printed.
    #[command(subcommand)]
    Secret(SecretCommand),
    /// Print the environment the backend would receive (secrets masked).
    Env {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Spawn a program with the backend environment and wait for it.
    Run {
        #[arg(long)]
        port: Option<u16>,
        #[arg(last = true, required = true, value_name = "PROGRAM")]
        program: Vec<String>,
    },
    /// Manage the CLI's own configuration file.
    #[command(subcommand)]
    CliConfig(CliConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the normalized config as JSON.
    Show,
    /// Update one desktop setting.
    SetDesktop { field: DesktopField, value: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopField {
    ShowMenuBarIcon,
    ShowDockIcon,
    SpellcheckEnabled,
    EnableWakelock,
    OpenSettingsShortcut,
    NewSessionShortcut,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SecretCommand {
    /// Store a secret; reads the value from stdin when omitted.
    Set { key: String, value: Option<String> },
    /// Delete a secret.
    Rm { key: String },
    /// List secret keys and timestamps.
    List,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
