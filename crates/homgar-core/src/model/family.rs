// ── Hardware families ──
//
// Static dispatch table from the vendor's model code to the decoder
// and status-id set a device instance uses.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Hardware variant, selected once at construction from the model code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelFamily {
    /// Root hub without its own telemetry.
    Hub,
    /// HWS019WRF-V2 display hub (temperature, humidity, pressure).
    DisplayHub,
    /// HCS014ARF temperature/humidity sensor.
    AirSensor,
    /// HCS012ARF rain gauge.
    RainSensor,
    /// HCS021FRF soil moisture sensor.
    SoilSensor,
    /// HTV405FRF four-zone water timer.
    ZoneTimer,
}

impl ModelFamily {
    /// Family for a hub's model code. Unknown codes fall back to a
    /// generic [`Hub`](Self::Hub).
    pub fn for_hub(model_code: i64) -> Self {
        match Self::from_code(model_code) {
            Some(Self::DisplayHub) => Self::DisplayHub,
            _ => Self::Hub,
        }
    }

    /// Family for a sub-device's model code, or `None` when the code is
    /// not supported (the sub-device is skipped).
    pub fn for_sub_device(model_code: i64) -> Option<Self> {
        Self::from_code(model_code).filter(|f| !f.is_hub())
    }

    fn from_code(model_code: i64) -> Option<Self> {
        match model_code {
            289 => Some(Self::DisplayHub),
            262 => Some(Self::AirSensor),
            87 => Some(Self::RainSensor),
            317 => Some(Self::SoilSensor),
            38 => Some(Self::ZoneTimer),
            _ => None,
        }
    }

    /// Whether devices of this family sit at the root of a hub.
    pub fn is_hub(self) -> bool {
        matches!(self, Self::Hub | Self::DisplayHub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_codes_fall_back_to_generic_hub() {
        assert_eq!(ModelFamily::for_hub(289), ModelFamily::DisplayHub);
        assert_eq!(ModelFamily::for_hub(1), ModelFamily::Hub);
        // a sensor code reported as a hub is still just a hub
        assert_eq!(ModelFamily::for_hub(262), ModelFamily::Hub);
    }

    #[test]
    fn unknown_sub_device_codes_are_skipped() {
        assert_eq!(ModelFamily::for_sub_device(262), Some(ModelFamily::AirSensor));
        assert_eq!(ModelFamily::for_sub_device(87), Some(ModelFamily::RainSensor));
        assert_eq!(ModelFamily::for_sub_device(317), Some(ModelFamily::SoilSensor));
        assert_eq!(ModelFamily::for_sub_device(38), Some(ModelFamily::ZoneTimer));
        assert_eq!(ModelFamily::for_sub_device(289), None);
        assert_eq!(ModelFamily::for_sub_device(9999), None);
    }

    #[test]
    fn display_uses_snake_case() {
        assert_eq!(ModelFamily::ZoneTimer.to_string(), "zone_timer");
        assert_eq!("air_sensor".parse::<ModelFamily>().ok(), Some(ModelFamily::AirSensor));
    }
}
