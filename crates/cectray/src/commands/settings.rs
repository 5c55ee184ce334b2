//! Settings subcommand handlers. These work on the settings file only and
//! never open the adapter.

use std::str::FromStr;

use cectray_core::{SettingKey, SettingsGraph, SettingsStore};

use crate::cli::{GlobalOpts, SettingsArgs, SettingsCommand};
use crate::error::CliError;

pub fn handle(args: SettingsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load_config(global)?;
    let store = super::open_store(global, &config)?;

    match args.command {
        SettingsCommand::List { all } => {
            let mut graph = SettingsGraph::new();
            graph.load_from(&store);
            for setting in graph.iter().filter(|s| all || s.persistent) {
                let marker = if setting.is_default() { "" } else { " *" };
                println!(
                    "{:<36} {:<28} {}{marker}",
                    setting.key.to_string(),
                    setting.label,
                    setting.value
                );
            }
            Ok(())
        }

        SettingsCommand::Set { key, value } => {
            let key = SettingKey::from_str(&key)
                .map_err(|_| CliError::UnknownSetting { name: key.clone() })?;
            let mut graph = SettingsGraph::new();
            graph.load_from(&store);
            if !graph.get(key).persistent {
                return Err(CliError::DeviceSourced {
                    key: key.to_string(),
                });
            }
            graph.set_all_enabled(true);
            graph.set_from_str(key, &value)?;
            graph.save_to(&store)?;
            println!("{key} = {}", graph.value(key));
            Ok(())
        }

        SettingsCommand::Reset => {
            store.clear();
            store.flush()?;
            eprintln!("Settings reset: {}", store.path().display());
            Ok(())
        }
    }
}
