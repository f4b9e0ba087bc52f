// ── Per-variant readings ──
//
// Last-known decoded values for each hardware family. Every field is
// optional until a frame supplies it; updates merge field by field and
// never clear a value that is already set.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Number of outputs on a multi-zone timer.
pub const ZONE_COUNT: usize = 4;

/// Overwrite `slot` only when the update carries a value.
fn merge<T>(slot: &mut Option<T>, update: Option<T>) {
    if update.is_some() {
        *slot = update;
    }
}

/// Status of one timer zone as reported by the hardware.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ZoneStatus {
    /// Valve open.
    On,
    /// Closed after a recent run.
    OffRecent,
    /// Closed and idle.
    OffIdle,
}

impl ZoneStatus {
    /// Map the two-byte status code that follows a zone pattern.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "D841" => Some(Self::On),
            "D800" => Some(Self::OffRecent),
            "D820" => Some(Self::OffIdle),
            _ => None,
        }
    }
}

// ── Variant readings ─────────────────────────────────────────────────

/// Display hub (model 289) readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayHubReadings {
    pub temperature_mk: Option<i32>,
    pub humidity: Option<u32>,
    pub pressure_pa: Option<u32>,
    /// Raw value of the hub's `state` status channel.
    pub state: Option<String>,
}

impl DisplayHubReadings {
    pub fn merge(&mut self, update: Self) {
        merge(&mut self.temperature_mk, update.temperature_mk);
        merge(&mut self.humidity, update.humidity);
        merge(&mut self.pressure_pa, update.pressure_pa);
        merge(&mut self.state, update.state);
    }
}

/// Air sensor readings. Temperatures in milli-Kelvin, humidity in %.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirReadings {
    pub temperature_mk: Option<i32>,
    pub temperature_min_mk: Option<i32>,
    pub temperature_max_mk: Option<i32>,
    pub humidity: Option<u8>,
    pub humidity_min: Option<u8>,
    pub humidity_max: Option<u8>,
}

impl AirReadings {
    pub fn merge(&mut self, update: Self) {
        merge(&mut self.temperature_mk, update.temperature_mk);
        merge(&mut self.temperature_min_mk, update.temperature_min_mk);
        merge(&mut self.temperature_max_mk, update.temperature_max_mk);
        merge(&mut self.humidity, update.humidity);
        merge(&mut self.humidity_min, update.humidity_min);
        merge(&mut self.humidity_max, update.humidity_max);
    }
}

/// Rain gauge accumulators in millimetres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RainReadings {
    pub last_hour_mm: Option<f64>,
    pub last_24h_mm: Option<f64>,
    pub last_7d_mm: Option<f64>,
    pub total_mm: Option<f64>,
}

impl RainReadings {
    pub fn merge(&mut self, update: Self) {
        merge(&mut self.last_hour_mm, update.last_hour_mm);
        merge(&mut self.last_24h_mm, update.last_24h_mm);
        merge(&mut self.last_7d_mm, update.last_7d_mm);
        merge(&mut self.total_mm, update.total_mm);
    }
}

/// Soil sensor readings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoilReadings {
    pub temperature_mk: Option<i32>,
    /// Volumetric moisture, %.
    pub moisture: Option<u8>,
}

impl SoilReadings {
    pub fn merge(&mut self, update: Self) {
        merge(&mut self.temperature_mk, update.temperature_mk);
        merge(&mut self.moisture, update.moisture);
    }
}

/// Multi-zone timer state. A zone without a reported status is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerReadings {
    pub zones: [Option<ZoneStatus>; ZONE_COUNT],
    /// Hardware sequence counter (`hex[2..8]` of the last frame).
    pub hw_sequence: String,
}

impl Default for TimerReadings {
    fn default() -> Self {
        Self {
            zones: [None; ZONE_COUNT],
            hw_sequence: "000000".into(),
        }
    }
}

/// Fields decoded from one timer frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerUpdate {
    pub zones: [Option<ZoneStatus>; ZONE_COUNT],
    pub hw_sequence: Option<String>,
}

impl TimerReadings {
    pub fn merge(&mut self, update: TimerUpdate) {
        for (slot, status) in self.zones.iter_mut().zip(update.zones) {
            merge(slot, status);
        }
        if let Some(seq) = update.hw_sequence {
            self.hw_sequence = seq;
        }
    }

    /// Status of a 1-based zone; `None` when the zone number is out of range.
    pub fn zone(&self, zone: u8) -> Option<Option<ZoneStatus>> {
        let idx = usize::from(zone).checked_sub(1)?;
        self.zones.get(idx).copied()
    }

    pub fn is_zone_active(&self, zone: u8) -> bool {
        self.zone(zone) == Some(Some(ZoneStatus::On))
    }

    /// `on`, `off_recent`, `off_idle`, `off` (never reported) or
    /// `unknown` (no such zone).
    pub fn zone_status_text(&self, zone: u8) -> &'static str {
        match self.zone(zone) {
            Some(Some(ZoneStatus::On)) => "on",
            Some(Some(ZoneStatus::OffRecent)) => "off_recent",
            Some(Some(ZoneStatus::OffIdle)) => "off_idle",
            Some(None) => "off",
            None => "unknown",
        }
    }
}

// ── Readings ─────────────────────────────────────────────────────────

/// Decoded state of a device, one variant per hardware family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Readings {
    Hub,
    DisplayHub(DisplayHubReadings),
    AirSensor(AirReadings),
    RainSensor(RainReadings),
    SoilSensor(SoilReadings),
    ZoneTimer(TimerReadings),
}

impl Readings {
    /// Empty readings for a family.
    pub fn empty(family: super::ModelFamily) -> Self {
        use super::ModelFamily;
        match family {
            ModelFamily::Hub => Self::Hub,
            ModelFamily::DisplayHub => Self::DisplayHub(DisplayHubReadings::default()),
            ModelFamily::AirSensor => Self::AirSensor(AirReadings::default()),
            ModelFamily::RainSensor => Self::RainSensor(RainReadings::default()),
            ModelFamily::SoilSensor => Self::SoilSensor(SoilReadings::default()),
            ModelFamily::ZoneTimer => Self::ZoneTimer(TimerReadings::default()),
        }
    }

    pub fn family(&self) -> super::ModelFamily {
        use super::ModelFamily;
        match self {
            Self::Hub => ModelFamily::Hub,
            Self::DisplayHub(_) => ModelFamily::DisplayHub,
            Self::AirSensor(_) => ModelFamily::AirSensor,
            Self::RainSensor(_) => ModelFamily::RainSensor,
            Self::SoilSensor(_) => ModelFamily::SoilSensor,
            Self::ZoneTimer(_) => ModelFamily::ZoneTimer,
        }
    }
}

// ── Presentation ─────────────────────────────────────────────────────

/// Milli-Kelvin to Celsius, rounded to one decimal.
pub fn mk_to_celsius(mk: i32) -> f64 {
    ((f64::from(mk) / 1000.0 - 273.15) * 10.0).round() / 10.0
}

/// A labelled value for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub label: String,
    pub value: ReadingValue,
}

/// Display value with its unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum ReadingValue {
    Celsius(f64),
    Percent(u32),
    Pascal(u32),
    Millimeters(f64),
    Zone(String),
    Text(String),
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius(c) => write!(f, "{c:.1}°C"),
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Pascal(pa) => write!(f, "{pa} Pa"),
            Self::Millimeters(mm) => write!(f, "{mm:.1} mm"),
            Self::Zone(s) | Self::Text(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.label, self.value)
    }
}

fn push_temp(out: &mut Vec<Reading>, label: &str, mk: Option<i32>) {
    if let Some(mk) = mk {
        out.push(Reading {
            label: label.into(),
            value: ReadingValue::Celsius(mk_to_celsius(mk)),
        });
    }
}

fn push_value(out: &mut Vec<Reading>, label: &str, value: Option<ReadingValue>) {
    if let Some(value) = value {
        out.push(Reading {
            label: label.into(),
            value,
        });
    }
}

impl Readings {
    /// Labelled readings for display, skipping values never reported.
    pub fn list(&self) -> Vec<Reading> {
        let mut out = Vec::new();
        match self {
            Self::Hub => {}
            Self::DisplayHub(r) => {
                push_temp(&mut out, "temperature", r.temperature_mk);
                push_value(&mut out, "humidity", r.humidity.map(ReadingValue::Percent));
                push_value(&mut out, "pressure", r.pressure_pa.map(ReadingValue::Pascal));
                push_value(&mut out, "state", r.state.clone().map(ReadingValue::Text));
            }
            Self::AirSensor(r) => {
                push_temp(&mut out, "temperature", r.temperature_mk);
                push_temp(&mut out, "temperature_min", r.temperature_min_mk);
                push_temp(&mut out, "temperature_max", r.temperature_max_mk);
                let pct = |v: Option<u8>| v.map(|v| ReadingValue::Percent(u32::from(v)));
                push_value(&mut out, "humidity", pct(r.humidity));
                push_value(&mut out, "humidity_min", pct(r.humidity_min));
                push_value(&mut out, "humidity_max", pct(r.humidity_max));
            }
            Self::RainSensor(r) => {
                let mm = |v: Option<f64>| v.map(ReadingValue::Millimeters);
                push_value(&mut out, "rain_last_hour", mm(r.last_hour_mm));
                push_value(&mut out, "rain_last_24h", mm(r.last_24h_mm));
                push_value(&mut out, "rain_last_7d", mm(r.last_7d_mm));
                push_value(&mut out, "rain_total", mm(r.total_mm));
            }
            Self::SoilSensor(r) => {
                push_temp(&mut out, "temperature", r.temperature_mk);
                push_value(
                    &mut out,
                    "moisture",
                    r.moisture.map(|v| ReadingValue::Percent(u32::from(v))),
                );
            }
            Self::ZoneTimer(r) => {
                for zone in 1..=4u8 {
                    // zone numbers are 1-based on the wire
                    out.push(Reading {
                        label: format!("zone_{zone}"),
                        value: ReadingValue::Zone(r.zone_status_text(zone).into()),
                    });
                }
            }
        }
        out
    }
}
