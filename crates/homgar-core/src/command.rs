// ── Command API ──
//
// Control operations flow through one `Command` enum so they run one at
// a time on the coordinator's command task.

use crate::error::CoreError;
use crate::model::ZoneMode;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// Operations routed through the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switch one zone of a multi-zone timer.
    ControlZone {
        key: String,
        zone: u8,
        mode: ZoneMode,
        /// Seconds; `0` with [`ZoneMode::On`] means the default run time.
        duration_secs: u32,
    },
    /// Run one poll cycle now.
    Refresh,
}

/// Outcome of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    /// Poll cycle finished with this many devices in the table.
    Refreshed { devices: usize },
}
