//! `homgar watch`: keep the coordinator running and print each change.

use chrono::Local;
use tracing::info;

use homgar_config::Config;

use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(cfg: &Config) -> Result<(), CliError> {
    let coordinator = config::build_coordinator(cfg, cfg.to_coordinator_config()?)?;
    if let Err(e) = coordinator.start().await {
        coordinator.shutdown().await;
        return Err(e.into());
    }
    config::save_session(cfg, &coordinator);

    let mut stream = coordinator.subscribe();
    let mut previous = stream.latest();
    output::print_output(&output::render_table(&previous));

    let mut state = coordinator.state();
    info!(state = %*state.borrow(), "watching for updates (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(state = %*state.borrow(), "coordinator state changed");
            }
            table = stream.changed() => {
                let Some(table) = table else { break };
                let now = Local::now().format("%H:%M:%S").to_string();
                for key in output::changed_keys(&previous, &table) {
                    if let Some(device) = table.get(key) {
                        output::print_output(&output::render_update(&now, device));
                    }
                }
                previous = table;
            }
        }
    }

    coordinator.shutdown().await;
    config::save_session(cfg, &coordinator);
    Ok(())
}
