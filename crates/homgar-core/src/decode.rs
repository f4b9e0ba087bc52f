// ── Frame decoder ──
//
// Pure functions from a raw status value to partial field updates for
// one hardware family. Offsets and markers are protocol constants
// observed on real hardware.
//
// A raw value is either `general;specific` or a bare `specific`
// segment. The general segment is comma-delimited with the signed RSSI
// in field 1. Specific segments come in three shapes:
//
//   hex      `...10#<hex digits>`   fixed or marker-relative byte slices
//   csv      `<int>,<int>,...`      positional decimal integers
//   stats    `N(min/max/avg)`       bucketed statistic, N is the value
//
// Decoding never fails as a whole: a field whose bytes are missing or
// malformed is left out of the update and the caller keeps its stale
// value.

use tracing::trace;

use crate::model::{
    AirReadings, DisplayHubReadings, ModelFamily, RainReadings, SoilReadings, TimerUpdate,
    ZONE_COUNT, ZoneStatus,
};

/// Marker that introduces a hex payload.
pub const HEX_MARKER: &str = "10#";

// Air sensor: little-endian tenths of °F.
const AIR_TEMP_MIN_OFFSET: usize = 2;
const AIR_TEMP_MAX_OFFSET: usize = 6;
const AIR_TEMP_CURRENT_OFFSET: usize = 20;
// Humidity triple follows `88`: current at +2, min at +6, max at +8.
const AIR_HUMIDITY_MARKER: &str = "88";
const AIR_HUMIDITY_FALLBACK_MARKER: &str = "87";

// Rain gauge: little-endian tenths of mm.
const RAIN_HOUR_OFFSET: usize = 2;
const RAIN_24H_OFFSET: usize = 10;
const RAIN_7D_OFFSET: usize = 26;
const RAIN_TOTAL_OFFSET: usize = 36;

// Soil sensor: moisture byte at +6 from `DC`.
const SOIL_MARKER: &str = "DC";
const SOIL_MOISTURE_OFFSET: usize = 6;

// Zone timer: zone N status code sits right after its pattern byte.
const TIMER_ZONE_PATTERNS: [&str; ZONE_COUNT] = ["19D8", "1AD8", "1BD8", "1CD8"];
const TIMER_SEQUENCE: std::ops::Range<usize> = 2..8;

// ── Frame envelope ───────────────────────────────────────────────────

/// A raw value split into its general and specific parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// RSSI from the general segment, if present and numeric.
    pub rssi: Option<i32>,
    /// The variant-specific segment.
    pub specific: &'a str,
}

/// Split `general;specific`. A value without `;` is all specific.
pub fn split_frame(raw: &str) -> Frame<'_> {
    match raw.split_once(';') {
        Some((general, rest)) => {
            let specific = rest.split(';').next().unwrap_or_default();
            Frame {
                rssi: parse_rssi(general),
                specific,
            }
        }
        None => Frame {
            rssi: None,
            specific: raw,
        },
    }
}

fn parse_rssi(general: &str) -> Option<i32> {
    general.split(',').nth(1)?.trim().parse().ok()
}

/// Fields decoded from one value, by family.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    DisplayHub(DisplayHubReadings),
    AirSensor(AirReadings),
    RainSensor(RainReadings),
    SoilSensor(SoilReadings),
    ZoneTimer(TimerUpdate),
}

/// Result of decoding one raw value.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub rssi: Option<i32>,
    /// `None` for families without specific telemetry.
    pub fields: Option<FieldUpdate>,
}

/// Decode a raw `D{address}` value for `family`.
///
/// Returns `None` for an empty value.
pub fn decode(family: ModelFamily, raw: &str) -> Option<Decoded> {
    if raw.is_empty() {
        return None;
    }
    let frame = split_frame(raw);
    let fields = match family {
        ModelFamily::Hub => None,
        ModelFamily::DisplayHub => Some(FieldUpdate::DisplayHub(decode_display_hub(frame.specific))),
        ModelFamily::AirSensor => Some(FieldUpdate::AirSensor(decode_air(frame.specific))),
        ModelFamily::RainSensor => Some(FieldUpdate::RainSensor(decode_rain(frame.specific))),
        ModelFamily::SoilSensor => Some(FieldUpdate::SoilSensor(decode_soil(frame.specific))),
        ModelFamily::ZoneTimer => Some(FieldUpdate::ZoneTimer(decode_timer(frame.specific))),
    };
    trace!(%family, raw, ?fields, "decoded frame");
    Some(Decoded {
        rssi: frame.rssi,
        fields,
    })
}

// ── Primitive readers ────────────────────────────────────────────────

/// Segment after the first `#`, when the value carries the `10#` marker.
fn hex_payload(specific: &str) -> Option<&str> {
    if specific.contains(HEX_MARKER) {
        specific.split('#').nth(1)
    } else {
        None
    }
}

/// One byte from two hex digits at `offset`.
fn byte_at(hex: &str, offset: usize) -> Option<u8> {
    let digits = hex.get(offset..offset.checked_add(2)?)?;
    u8::from_str_radix(digits, 16).ok()
}

/// Little-endian u16 from four hex digits at `offset` (`5802` → 0x0258).
fn u16_le_at(hex: &str, offset: usize) -> Option<u16> {
    let lo = byte_at(hex, offset)?;
    let hi = byte_at(hex, offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([lo, hi]))
}

/// Byte at `offset` past the first occurrence of `marker`.
fn byte_after_marker(hex: &str, marker: &str, offset: usize) -> Option<u8> {
    let pos = hex.find(marker)?;
    byte_at(hex, pos.checked_add(offset)?)
}

// ── Units ────────────────────────────────────────────────────────────

/// Tenths of °F to milli-Kelvin, rounded to the nearest integer.
#[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
pub fn fahrenheit_tenths_to_mk(tenths: i32) -> i32 {
    let celsius = (f64::from(tenths) * 0.1 - 32.0) * 5.0 / 9.0;
    ((celsius + 273.15) * 1000.0).round() as i32
}

/// A bucketed statistic `N(min/max/avg)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub value: u32,
    pub min: u32,
    pub max: u32,
    pub avg: u32,
}

/// Parse `N(min/max/avg)`; the whole string must match.
pub fn parse_stats(s: &str) -> Option<Stats> {
    let (value, rest) = s.split_once('(')?;
    let inner = rest.strip_suffix(')')?;
    let mut parts = inner.split('/');
    let stats = Stats {
        value: parse_digits(value)?,
        min: parse_digits(parts.next()?)?,
        max: parse_digits(parts.next()?)?,
        avg: parse_digits(parts.next()?)?,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(stats)
}

/// Unsigned decimal with no sign, spaces or other characters.
fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// ── Variant decoders ─────────────────────────────────────────────────

/// Display hub: `temp,humidity,pressure` as stats values. A zero value
/// is treated as absent.
pub fn decode_display_hub(specific: &str) -> DisplayHubReadings {
    let parts: Vec<&str> = specific.split(',').collect();
    let &[temp, humidity, pressure, ..] = parts.as_slice() else {
        return DisplayHubReadings::default();
    };
    let nonzero = |s: &str| parse_stats(s).map(|st| st.value).filter(|v| *v != 0);

    DisplayHubReadings {
        temperature_mk: nonzero(temp)
            .and_then(|v| i32::try_from(v).ok())
            .map(fahrenheit_tenths_to_mk),
        humidity: nonzero(humidity),
        pressure_pa: nonzero(pressure),
        state: None,
    }
}

/// Air sensor hex frame.
pub fn decode_air(specific: &str) -> AirReadings {
    let Some(hex) = hex_payload(specific) else {
        return AirReadings::default();
    };
    let temp = |offset| u16_le_at(hex, offset).map(|t| fahrenheit_tenths_to_mk(i32::from(t)));

    let mut update = AirReadings {
        temperature_min_mk: temp(AIR_TEMP_MIN_OFFSET),
        temperature_max_mk: temp(AIR_TEMP_MAX_OFFSET),
        temperature_mk: temp(AIR_TEMP_CURRENT_OFFSET),
        ..AirReadings::default()
    };

    if hex.contains(AIR_HUMIDITY_MARKER) {
        update.humidity = byte_after_marker(hex, AIR_HUMIDITY_MARKER, 2);
        update.humidity_min = byte_after_marker(hex, AIR_HUMIDITY_MARKER, 6);
        update.humidity_max = byte_after_marker(hex, AIR_HUMIDITY_MARKER, 8);
    } else {
        update.humidity = byte_after_marker(hex, AIR_HUMIDITY_FALLBACK_MARKER, 2);
    }
    update
}

/// Rain gauge hex frame.
pub fn decode_rain(specific: &str) -> RainReadings {
    let Some(hex) = hex_payload(specific) else {
        return RainReadings::default();
    };
    let mm = |offset| u16_le_at(hex, offset).map(|v| f64::from(v) / 10.0);

    RainReadings {
        last_hour_mm: mm(RAIN_HOUR_OFFSET),
        last_24h_mm: mm(RAIN_24H_OFFSET),
        last_7d_mm: mm(RAIN_7D_OFFSET),
        total_mm: mm(RAIN_TOTAL_OFFSET),
    }
}

/// Soil sensor: hex frame with a `DC` marker, or `temp,moisture` CSV.
pub fn decode_soil(specific: &str) -> SoilReadings {
    if let Some(hex) = hex_payload(specific) {
        let moisture = hex.find(SOIL_MARKER).and_then(|pos| {
            // the marker block is four bytes long
            if pos + 8 <= hex.len() {
                byte_at(hex, pos + SOIL_MOISTURE_OFFSET)
            } else {
                None
            }
        });
        return SoilReadings {
            temperature_mk: None,
            moisture,
        };
    }

    let mut parts = specific.split(',');
    match (parts.next(), parts.next()) {
        (Some(temp), Some(moisture)) => SoilReadings {
            temperature_mk: temp.trim().parse().ok().map(fahrenheit_tenths_to_mk),
            moisture: moisture.trim().parse().ok(),
        },
        _ => SoilReadings::default(),
    }
}

/// Zone timer hex frame. Needs a `#`; the `10` prefix is optional.
pub fn decode_timer(specific: &str) -> TimerUpdate {
    let Some(hex) = specific.split('#').nth(1) else {
        return TimerUpdate::default();
    };

    let mut update = TimerUpdate {
        hw_sequence: hex.get(TIMER_SEQUENCE).map(str::to_owned),
        ..TimerUpdate::default()
    };
    for (slot, pattern) in update.zones.iter_mut().zip(TIMER_ZONE_PATTERNS) {
        *slot = hex
            .find(pattern)
            .and_then(|pos| hex.get(pos + 2..pos + 6))
            .and_then(ZoneStatus::from_code);
    }
    update
}
