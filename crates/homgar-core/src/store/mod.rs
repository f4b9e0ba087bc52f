// ── Reactive data store ──
//
// Lock-free device storage with push-based change notification.

mod collection;
mod device_store;
mod refresh;

pub use collection::Snapshot;
pub use device_store::{DeviceStore, DeviceTable};
