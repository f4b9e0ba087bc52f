//! Clap derive structures for the `homgar` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use homgar_core::ZoneMode;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homgar -- HomGar / RainPoint irrigation and weather devices
#[derive(Debug, Parser)]
#[command(
    name = "homgar",
    version,
    about = "Read HomGar sensors and switch irrigation zones",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "HOMGAR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll once and list every device with its readings
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Stay connected and print device updates until Ctrl-C
    Watch,

    /// Switch one zone of a multi-zone timer
    Zone(ZoneArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ZoneSwitch {
    On,
    Off,
}

impl From<ZoneSwitch> for ZoneMode {
    fn from(switch: ZoneSwitch) -> Self {
        match switch {
            ZoneSwitch::On => Self::On,
            ZoneSwitch::Off => Self::Off,
        }
    }
}

#[derive(Debug, Args)]
pub struct ZoneArgs {
    /// Device key as listed by `homgar devices` (e.g. device_200_3)
    pub device: String,

    /// Zone number (1-4)
    #[arg(value_parser = clap::value_parser!(u8).range(1..=4))]
    pub zone: u8,

    /// Turn the zone on or off
    pub switch: ZoneSwitch,

    /// Run time in seconds when switching on (0 = timer default)
    #[arg(long, short = 'd', default_value = "0")]
    pub duration: u32,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration (password redacted)
    Show,
}
