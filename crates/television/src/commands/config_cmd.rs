//! Config subcommand handlers.

use television_config::{config_path, load_config, render_config};

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config_path().display());
        }
        ConfigCommand::Show => {
            let cfg = load_config()?;
            print!("{}", render_config(&cfg)?);
        }
    }
    Ok(())
}
