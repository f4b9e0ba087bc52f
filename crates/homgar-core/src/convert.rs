// ── API-to-domain conversions ──
//
// Bridges raw `homgar_api` records into the domain model. Model codes
// pick the hardware family here, once, at construction.

use homgar_api::PushMessage;
use homgar_api::models::{HomeRecord, HubRecord, StatusEntry, SubDeviceRecord};
use serde_json::Value;
use tracing::debug;

use crate::model::{
    Device, DeviceRole, HUB_ADDRESS, Home, Hub, HubLink, ModelFamily, Readings, StatusFragment,
    hub_key, sub_device_key,
};

impl From<HomeRecord> for Home {
    fn from(r: HomeRecord) -> Self {
        Self {
            id: r.hid,
            name: r.home_name,
        }
    }
}

impl From<StatusEntry> for StatusFragment {
    fn from(e: StatusEntry) -> Self {
        Self {
            id: e.id,
            value: e.value,
        }
    }
}

/// Build a sub-device from a raw entry, or `None` for an unsupported
/// model code or a record missing its identifiers.
fn sub_device(raw: Value, hub_link: &HubLink, hub: &str) -> Option<Device> {
    let model_code = raw.get("modelCode").and_then(Value::as_i64);
    let Some(family) = model_code.and_then(ModelFamily::for_sub_device) else {
        debug!(
            name = raw.get("name").and_then(serde_json::Value::as_str).unwrap_or_default(),
            ?model_code,
            "skipping unsupported sub-device"
        );
        return None;
    };
    let r: SubDeviceRecord = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            debug!(?model_code, error = %e, "skipping malformed sub-device");
            return None;
        }
    };
    Some(Device {
        key: sub_device_key(r.mid, r.addr),
        name: r.name,
        model: r.model,
        model_code: r.model_code,
        did: r.did,
        mid: r.mid,
        address: r.addr,
        port_number: r.port_number,
        soft_ver: r.soft_ver,
        hub_link: hub_link.clone(),
        role: DeviceRole::SubDevice { hub: hub.to_owned() },
        connected: None,
        rssi: None,
        readings: Readings::empty(family),
    })
}

impl From<HubRecord> for Hub {
    fn from(r: HubRecord) -> Self {
        let key = hub_key(r.mid);
        let hub_link = HubLink {
            device_name: r.device_name,
            product_key: r.product_key,
        };
        let sub_devices: Vec<Device> = r
            .sub_devices
            .into_iter()
            .filter_map(|s| sub_device(s, &hub_link, &key))
            .collect();

        let device = Device {
            key,
            name: r.name,
            model: r.model,
            model_code: r.model_code,
            did: r.did,
            mid: r.mid,
            address: HUB_ADDRESS,
            port_number: r.port_number,
            soft_ver: r.soft_ver,
            hub_link,
            role: DeviceRole::Hub {
                sub_devices: sub_devices.iter().map(|d| d.key.clone()).collect(),
            },
            connected: None,
            rssi: None,
            readings: Readings::empty(ModelFamily::for_hub(r.model_code)),
        };
        Self {
            device,
            sub_devices,
        }
    }
}

/// Field updates carried by one push message, addressed to a hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushUpdate {
    pub mid: i64,
    pub fragments: Vec<StatusFragment>,
}

impl PushUpdate {
    /// Extract the hub id and status fragments. `None` when the message
    /// names no numeric hub id or carries no fields.
    pub fn from_message(message: &PushMessage) -> Option<Self> {
        let mid = message.device_id()?.parse().ok()?;
        let fragments: Vec<StatusFragment> = message
            .fields()
            .into_iter()
            .filter(|(id, _)| id != "deviceId" && id != "mid")
            .map(|(id, value)| StatusFragment { id, value })
            .collect();
        if fragments.is_empty() {
            return None;
        }
        Some(Self { mid, fragments })
    }
}
