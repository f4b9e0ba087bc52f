// ── Device store ──
//
// Holds the device table shared by the poll and push paths. Readers get
// cheap `Arc` snapshots; writers publish through `watch` channels.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::{EntityCollection, Snapshot};
use crate::model::{Device, Home};
use crate::stream::DeviceTableStream;

/// The device table: key → device, ordered by key.
pub type DeviceTable = Snapshot<Device>;

/// Central reactive store for homes and devices.
pub struct DeviceStore {
    pub(crate) devices: EntityCollection<Device>,
    pub(crate) homes: watch::Sender<Arc<Vec<Home>>>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_push_update: watch::Sender<Option<DateTime<Utc>>>,
    /// Serializes poll replacement against push merges.
    pub(crate) write_lock: Mutex<()>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (homes, _) = watch::channel(Arc::new(Vec::new()));
        let (last_full_refresh, _) = watch::channel(None);
        let (last_push_update, _) = watch::channel(None);

        Self {
            devices: EntityCollection::new(),
            homes,
            last_full_refresh,
            last_push_update,
            write_lock: Mutex::new(()),
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn device_table(&self) -> DeviceTable {
        self.devices.snapshot()
    }

    pub fn device(&self, key: &str) -> Option<Arc<Device>> {
        self.devices.get_by_key(key)
    }

    /// The hub and sub-devices sharing a hub id, hub first.
    pub fn devices_for_mid(&self, mid: i64) -> Vec<Arc<Device>> {
        let mut devices = self.devices.filter(|d| d.mid == mid);
        devices.sort_by_key(|d| (!d.is_hub(), d.address));
        devices
    }

    pub fn homes(&self) -> Arc<Vec<Home>> {
        self.homes.borrow().clone()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Version of the device table, bumped on every publish.
    pub fn version(&self) -> u64 {
        self.devices.version()
    }

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    pub fn last_push_update(&self) -> Option<DateTime<Utc>> {
        *self.last_push_update.borrow()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_devices(&self) -> DeviceTableStream {
        DeviceTableStream::new(self.devices.subscribe())
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
