//! `homgar zone`: switch one zone of a timer.

use tracing::info;

use homgar_config::Config;
use homgar_core::{CoreError, ZoneMode};

use crate::cli::ZoneArgs;
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(cfg: &Config, args: &ZoneArgs) -> Result<(), CliError> {
    let mode = ZoneMode::from(args.switch);
    let key = args.device.clone();
    let (zone, duration) = (args.zone, args.duration);

    let accepted = config::run_once(cfg, |c| async move {
        if c.device(&key).is_none() {
            return Err(CoreError::DeviceNotFound { key });
        }
        Ok(c.control_zone(&key, zone, mode, duration).await)
    })
    .await?;

    if !accepted {
        return Err(CliError::ZoneRejected {
            key: args.device.clone(),
        });
    }
    info!(device = %args.device, zone, %mode, "zone command accepted");
    let message = match mode {
        ZoneMode::On => format!(
            "zone {zone} of {} switched on for {}s",
            args.device,
            mode.effective_duration(duration)
        ),
        ZoneMode::Off => format!("zone {zone} of {} switched off", args.device),
    };
    output::print_output(&message);
    Ok(())
}
