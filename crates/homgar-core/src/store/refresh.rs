// ── Refresh application logic ──
//
// Poll cycles replace the device table wholesale; push messages merge
// fields into the devices of one hub. Both paths publish a single
// snapshot per call.

use std::sync::{Arc, PoisonError};

use chrono::Utc;
use tracing::{debug, trace};

use super::DeviceStore;
use crate::model::{Device, Home, Hub, StatusFragment, route_map};

impl DeviceStore {
    /// Replace the table with the devices of one poll cycle.
    ///
    /// Upserts first and prunes after, so subscribers never observe an
    /// empty table between cycles.
    pub(crate) fn apply_poll(&self, homes: Vec<Home>, hubs: Vec<Hub>) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let items: Vec<(String, Device)> = hubs
            .into_iter()
            .flat_map(Hub::into_devices)
            .map(|d| (d.key.clone(), d))
            .collect();
        debug!(devices = items.len(), homes = homes.len(), "applying poll snapshot");

        self.devices.replace_all(items);
        self.homes.send_replace(Arc::new(homes));
        self.last_full_refresh.send_replace(Some(Utc::now()));
    }

    /// Merge pushed fields into the devices under hub `mid`, routed by
    /// status id. Returns how many fragments were applied.
    pub(crate) fn apply_push(&self, mid: i64, fragments: &[StatusFragment]) -> usize {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working: Vec<Device> = self
            .devices_for_mid(mid)
            .iter()
            .map(|d| Device::clone(d))
            .collect();
        if working.is_empty() {
            trace!(mid, "push for unknown hub dropped");
            return 0;
        }

        let routes = route_map(working.iter());
        let mut applied = 0;
        for fragment in fragments {
            let Some(key) = routes.get(&fragment.id) else {
                continue;
            };
            if let Some(device) = working.iter_mut().find(|d| &d.key == key) {
                if device.apply(fragment) {
                    applied += 1;
                }
            }
        }

        if applied > 0 {
            self.devices
                .upsert_many(working.into_iter().map(|d| (d.key.clone(), d)));
            self.last_push_update.send_replace(Some(Utc::now()));
        }
        applied
    }
}
