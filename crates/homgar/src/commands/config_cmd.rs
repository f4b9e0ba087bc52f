//! `homgar config`: config location and effective values.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::resolve_path(global).display().to_string());
        }
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let mut rendered = cfg.to_toml()?;
            if cfg.password.is_some() {
                rendered.push_str("password = \"********\"\n");
            }
            output::print_output(rendered.trim_end());
        }
    }
    Ok(())
}
