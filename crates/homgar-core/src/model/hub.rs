// ── Hub aggregate ──
//
// A hub and the sub-devices it owns, as enumerated in one poll cycle.
// Status documents are fetched per hub and routed to its devices by
// status id.

use std::collections::HashMap;

use homgar_api::models::SubscribeTarget;
use tracing::trace;

use super::device::{CONNECTED_ID, Device, StatusFragment};

/// A hub with the sub-devices it exclusively owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Hub {
    pub device: Device,
    pub sub_devices: Vec<Device>,
}

impl Hub {
    pub fn mid(&self) -> i64 {
        self.device.mid
    }

    /// The hub followed by its sub-devices.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        std::iter::once(&self.device).chain(self.sub_devices.iter())
    }

    fn device_mut(&mut self, key: &str) -> Option<&mut Device> {
        std::iter::once(&mut self.device)
            .chain(self.sub_devices.iter_mut())
            .find(|d| d.key == key)
    }

    /// Route each fragment to the device declaring its id. Returns how
    /// many fragments were applied; unknown ids are dropped.
    pub fn apply_status(&mut self, fragments: impl IntoIterator<Item = StatusFragment>) -> usize {
        let routes = route_map(self.devices());
        let mut applied = 0;
        for fragment in fragments {
            let Some(key) = routes.get(&fragment.id) else {
                trace!(hub = self.mid(), id = %fragment.id, "no device for status id");
                continue;
            };
            if let Some(device) = self.device_mut(key) {
                if device.apply(&fragment) {
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Push-subscription target for this hub; `None` without a product key.
    pub fn subscribe_target(&self) -> Option<SubscribeTarget> {
        let link = &self.device.hub_link;
        let product_key = link.product_key.clone()?;
        Some(SubscribeTarget {
            device_name: link
                .device_name
                .clone()
                .unwrap_or_else(|| format!("MAC-{}", self.mid())),
            mid: self.mid().to_string(),
            product_key,
        })
    }

    pub fn into_devices(self) -> Vec<Device> {
        let mut devices = Vec::with_capacity(self.sub_devices.len() + 1);
        devices.push(self.device);
        devices.extend(self.sub_devices);
        devices
    }
}

/// Map every declared status id to the key of the device that owns it.
///
/// Addressed ids go to the last declarer, so a sub-device wins a `D..`
/// id it shares with its hub. `connected` stays with the first declarer
/// (the hub), whose cloud link it reports.
pub fn route_map<'a>(devices: impl IntoIterator<Item = &'a Device>) -> HashMap<String, String> {
    let mut routes = HashMap::new();
    for device in devices {
        for id in device.status_ids() {
            if id == CONNECTED_ID && routes.contains_key(&id) {
                continue;
            }
            routes.insert(id, device.key.clone());
        }
    }
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::device::{DeviceRole, HubLink, hub_key, sub_device_key};
    use crate::model::{ModelFamily, Readings};
    use pretty_assertions::assert_eq;

    fn device(key: String, family: ModelFamily, address: u8, role: DeviceRole) -> Device {
        Device {
            key,
            name: format!("dev {address}"),
            model: None,
            model_code: 0,
            did: i64::from(address),
            mid: 7,
            address,
            port_number: 1,
            soft_ver: None,
            hub_link: HubLink {
                device_name: None,
                product_key: Some("pk".into()),
            },
            role,
            connected: None,
            rssi: None,
            readings: Readings::empty(family),
        }
    }

    fn hub() -> Hub {
        let subs = vec![
            device(
                sub_device_key(7, 1),
                ModelFamily::SoilSensor,
                1,
                DeviceRole::SubDevice { hub: hub_key(7) },
            ),
            device(
                sub_device_key(7, 2),
                ModelFamily::AirSensor,
                2,
                DeviceRole::SubDevice { hub: hub_key(7) },
            ),
        ];
        Hub {
            device: device(
                hub_key(7),
                ModelFamily::DisplayHub,
                1,
                DeviceRole::Hub {
                    sub_devices: subs.iter().map(|d| d.key.clone()).collect(),
                },
            ),
            sub_devices: subs,
        }
    }

    #[test]
    fn routes_prefer_sub_devices_for_addressed_ids() {
        let hub = hub();
        let routes = route_map(hub.devices());
        assert_eq!(routes["connected"], "hub_7");
        assert_eq!(routes["state"], "hub_7");
        assert_eq!(routes["D01"], "device_7_1");
        assert_eq!(routes["D02"], "device_7_2");
    }

    #[test]
    fn apply_status_routes_and_ignores_unknown_ids() {
        let mut hub = hub();
        let applied = hub.apply_status(vec![
            StatusFragment::new("connected", "1"),
            StatusFragment::new("D01", "680,41"),
            StatusFragment::new("D09", "whatever"),
        ]);
        assert_eq!(applied, 2);
        assert_eq!(hub.device.connected, Some(true));
        assert_eq!(hub.sub_devices[1].connected, None);

        let Readings::SoilSensor(soil) = &hub.sub_devices[0].readings else {
            panic!("soil readings expected");
        };
        assert_eq!(soil.moisture, Some(41));
    }

    #[test]
    fn subscribe_target_defaults_device_name() {
        let target = hub().subscribe_target();
        assert_eq!(
            target,
            Some(SubscribeTarget {
                device_name: "MAC-7".into(),
                mid: "7".into(),
                product_key: "pk".into(),
            })
        );
    }

    #[test]
    fn hub_without_product_key_has_no_target() {
        let mut hub = hub();
        hub.device.hub_link.product_key = None;
        assert_eq!(hub.subscribe_target(), None);
    }

    #[test]
    fn into_devices_puts_hub_first() {
        let keys: Vec<String> = hub().into_devices().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["hub_7", "device_7_1", "device_7_2"]);
    }
}
