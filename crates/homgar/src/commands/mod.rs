//! Command dispatch: bridges CLI args to the coordinator and output.

pub mod config_cmd;
pub mod devices;
pub mod watch;
pub mod zone;

use homgar_config::Config;

use crate::cli::Command;
use crate::error::CliError;

/// Dispatch a cloud-bound command to its handler.
pub async fn dispatch(cmd: Command, cfg: &Config) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(cfg, &args).await,
        Command::Watch => watch::handle(cfg).await,
        Command::Zone(args) => zone::handle(cfg, &args).await,
        // Handled before dispatch; needs no credentials.
        Command::Config(_) => Ok(()),
    }
}
