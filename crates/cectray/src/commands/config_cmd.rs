//! Config subcommand handlers.

use cectray_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(cectray_config::config_path);

    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::Show => {
            let config = super::load_config(global)?;
            let text = toml::to_string_pretty(&config).map_err(cectray_config::ConfigError::from)?;
            print!("{text}");
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            cectray_config::save_config_to(&Config::default(), &path)?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        }
    }
}
