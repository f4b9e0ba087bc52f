//! `homgar devices`: one poll cycle, printed as a table or JSON.

use homgar_config::Config;

use crate::cli::DevicesArgs;
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(cfg: &Config, args: &DevicesArgs) -> Result<(), CliError> {
    let table = config::run_once(cfg, |c| async move { Ok(c.device_table()) }).await?;

    let rendered = if args.json {
        output::render_json(&table)?
    } else {
        output::render_table(&table)
    };
    output::print_output(&rendered);
    Ok(())
}
