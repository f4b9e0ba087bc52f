// ── Domain model ──
//
// Homes, hubs and sub-devices with their decoded readings. Every device
// accepts status fragments through one `apply` entry point; the hardware
// family picked at construction decides how its frames decode.

pub mod device;
pub mod family;
pub mod home;
pub mod hub;
pub mod readings;

pub use device::{
    CONNECTED_ID, DEFAULT_ZONE_DURATION_SECS, Device, DeviceRole, HUB_ADDRESS, HubLink, STATE_ID,
    StatusFragment, ZoneMode, address_id, hub_key, sub_device_key,
};
pub use family::ModelFamily;
pub use home::Home;
pub use hub::{Hub, route_map};
pub use readings::{
    AirReadings, DisplayHubReadings, RainReadings, Reading, ReadingValue, Readings, SoilReadings,
    TimerReadings, TimerUpdate, ZONE_COUNT, ZoneStatus, mk_to_celsius,
};
