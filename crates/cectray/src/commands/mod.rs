//! Subcommand handlers.

pub mod config_cmd;
pub mod run;
pub mod settings;

use cectray_config::{Config, FileSettingsStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config from `--config` or the canonical path.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let config = match global.config.as_deref() {
        Some(path) => cectray_config::load_config_from(path)?,
        None => cectray_config::load_config()?,
    };
    Ok(config)
}

/// Settings store from `--settings` or the config file.
pub fn open_store(global: &GlobalOpts, config: &Config) -> Result<FileSettingsStore, CliError> {
    let path = global
        .settings
        .clone()
        .unwrap_or_else(|| config.settings_path());
    tracing::debug!(path = %path.display(), "opening settings store");
    Ok(FileSettingsStore::open(path)?)
}
