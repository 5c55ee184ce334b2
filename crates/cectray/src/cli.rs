//! Clap derive structures for the `cectray` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cectray -- drive your TV and amplifier from the computer over HDMI-CEC
#[derive(Debug, Parser)]
#[command(
    name = "cectray",
    version,
    about = "Control HDMI-CEC devices from the computer",
    long_about = "Keeps the TV and amplifier in step with the computer over HDMI-CEC.\n\n\
        Puts devices in standby when the computer idles, sleeps or starts its\n\
        screensaver, and wakes them again on activity.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, short = 'c', env = "CECTRAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Settings file (overrides the config file)
    #[arg(long, env = "CECTRAY_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon until interrupted
    Run(RunArgs),

    /// Inspect and edit persisted settings
    #[command(alias = "s")]
    Settings(SettingsArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Do not query X11 for idle time and screensaver state
    #[arg(long)]
    pub no_x11: bool,

    /// Save settings to disk on exit
    #[arg(long)]
    pub save_on_exit: bool,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// List every setting with its value
    #[command(alias = "ls")]
    List {
        /// Also show settings read from the adapter
        #[arg(long, short = 'a')]
        all: bool,
    },

    /// Change one setting (e.g. `set standby-screen 10m`)
    Set {
        /// Setting key, long (`global_hdmi_port`) or short (`hdmi-port`)
        key: String,
        value: String,
    },

    /// Forget all persisted settings
    Reset,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
