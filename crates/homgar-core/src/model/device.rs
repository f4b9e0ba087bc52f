// ── Device entity ──
//
// One hub or sub-device with its last-known state. Poll and push both
// feed it through `apply`, one status fragment at a time.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::trace;

use homgar_api::WorkModeCommand;

use super::family::ModelFamily;
use super::readings::{Reading, Readings, TimerReadings, ZONE_COUNT};
use crate::decode::{self, FieldUpdate};

/// Status id carrying link liveness (`"1"` = connected).
pub const CONNECTED_ID: &str = "connected";

/// Display hub status id carrying the raw hub state.
pub const STATE_ID: &str = "state";

/// Address every hub answers on.
pub const HUB_ADDRESS: u8 = 1;

/// Default run time for a zone switched on without a duration, seconds.
pub const DEFAULT_ZONE_DURATION_SECS: u32 = 600;

/// Table key of a hub.
pub fn hub_key(mid: i64) -> String {
    format!("hub_{mid}")
}

/// Table key of a sub-device.
pub fn sub_device_key(mid: i64, address: u8) -> String {
    format!("device_{mid}_{address}")
}

/// Addressed status id, `D{address:02}`.
pub fn address_id(address: u8) -> String {
    format!("D{address:02}")
}

/// One `{id, value}` status update, as delivered by poll or push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFragment {
    pub id: String,
    pub value: String,
}

impl StatusFragment {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// Identity of the hub a device talks through; needed for commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubLink {
    pub device_name: Option<String>,
    pub product_key: Option<String>,
}

/// Position of a device in the hub tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum DeviceRole {
    /// Root device; lists the table keys of its sub-devices.
    Hub { sub_devices: Vec<String> },
    /// Reached through the hub with this table key.
    SubDevice { hub: String },
}

/// Zone switch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ZoneMode {
    Off,
    On,
}

impl ZoneMode {
    /// Work-mode code on the wire.
    pub fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    /// Duration to send: `On` defaults to ten minutes, `Off` is always 0.
    pub fn effective_duration(self, duration_secs: u32) -> u32 {
        match self {
            Self::Off => 0,
            Self::On if duration_secs == 0 => DEFAULT_ZONE_DURATION_SECS,
            Self::On => duration_secs,
        }
    }
}

/// A hub or sub-device with its last-known state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable table key (`hub_{mid}` / `device_{mid}_{addr}`).
    pub key: String,
    pub name: String,
    pub model: Option<String>,
    pub model_code: i64,
    pub did: i64,
    /// Vendor id of the owning hub (shared by its sub-devices).
    pub mid: i64,
    pub address: u8,
    pub port_number: u32,
    pub soft_ver: Option<String>,
    pub hub_link: HubLink,
    pub role: DeviceRole,
    pub connected: Option<bool>,
    pub rssi: Option<i32>,
    pub readings: Readings,
}

impl Device {
    pub fn family(&self) -> ModelFamily {
        self.readings.family()
    }

    pub fn is_hub(&self) -> bool {
        matches!(self.role, DeviceRole::Hub { .. })
    }

    /// The `D{address}` id this device decodes.
    pub fn address_id(&self) -> String {
        address_id(self.address)
    }

    /// Status ids this device accepts, in declaration order.
    pub fn status_ids(&self) -> IndexSet<String> {
        match self.family() {
            ModelFamily::Hub => IndexSet::from([CONNECTED_ID.to_owned()]),
            ModelFamily::DisplayHub => IndexSet::from([
                CONNECTED_ID.to_owned(),
                STATE_ID.to_owned(),
                address_id(HUB_ADDRESS),
            ]),
            _ => IndexSet::from([self.address_id(), CONNECTED_ID.to_owned()]),
        }
    }

    /// Apply one status fragment. Returns whether the fragment was
    /// addressed to this device; malformed values leave state untouched.
    pub fn apply(&mut self, fragment: &StatusFragment) -> bool {
        if fragment.id == CONNECTED_ID {
            if let Ok(v) = fragment.value.trim().parse::<i64>() {
                self.connected = Some(v == 1);
            }
            return true;
        }

        if fragment.id == self.address_id() {
            self.apply_frame(&fragment.value);
            return true;
        }

        if fragment.id == STATE_ID {
            if let Readings::DisplayHub(r) = &mut self.readings {
                r.state = Some(fragment.value.clone());
                return true;
            }
        }

        trace!(device = %self.key, id = %fragment.id, "ignoring fragment");
        false
    }

    fn apply_frame(&mut self, raw: &str) {
        let Some(decoded) = decode::decode(self.family(), raw) else {
            return;
        };
        if decoded.rssi.is_some() {
            self.rssi = decoded.rssi;
        }
        match (&mut self.readings, decoded.fields) {
            (Readings::DisplayHub(r), Some(FieldUpdate::DisplayHub(u))) => r.merge(u),
            (Readings::AirSensor(r), Some(FieldUpdate::AirSensor(u))) => r.merge(u),
            (Readings::RainSensor(r), Some(FieldUpdate::RainSensor(u))) => r.merge(u),
            (Readings::SoilSensor(r), Some(FieldUpdate::SoilSensor(u))) => r.merge(u),
            (Readings::ZoneTimer(r), Some(FieldUpdate::ZoneTimer(u))) => r.merge(u),
            _ => {}
        }
    }

    // ── Read surface ─────────────────────────────────────────────────

    /// Labelled readings for display.
    pub fn readings(&self) -> Vec<Reading> {
        self.readings.list()
    }

    fn timer(&self) -> Option<&TimerReadings> {
        match &self.readings {
            Readings::ZoneTimer(t) => Some(t),
            _ => None,
        }
    }

    /// Whether a zone is currently watering. `false` for non-timers.
    pub fn is_zone_active(&self, zone: u8) -> bool {
        self.timer().is_some_and(|t| t.is_zone_active(zone))
    }

    /// Zone status text; `unknown` for non-timers or out-of-range zones.
    pub fn zone_status_text(&self, zone: u8) -> &'static str {
        self.timer().map_or("unknown", |t| t.zone_status_text(zone))
    }

    // ── Control ──────────────────────────────────────────────────────

    /// Build the work-mode command switching one zone. `None` unless this
    /// is a timer with a valid zone and its hub identity is known.
    pub fn zone_command(
        &self,
        zone: u8,
        mode: ZoneMode,
        duration_secs: u32,
    ) -> Option<WorkModeCommand> {
        self.timer()?;
        if zone == 0 || usize::from(zone) > ZONE_COUNT {
            return None;
        }
        Some(WorkModeCommand {
            device_name: self.hub_link.device_name.clone()?,
            product_key: self.hub_link.product_key.clone()?,
            mid: self.mid,
            addr: self.address,
            port: zone,
            mode: mode.code(),
            duration: mode.effective_duration(duration_secs),
        })
    }
}
