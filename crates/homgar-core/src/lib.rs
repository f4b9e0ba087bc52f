//! Device model, frame decoding and poll/push reconciliation for HomGar
//! irrigation and weather hardware.
//!
//! - **[`decode`]**: Per-model parsers turning the cloud's delimited
//!   hex/decimal status strings into typed readings. Pure and
//!   side-effect free; malformed input yields fewer fields, never a panic.
//!
//! - **Domain model** ([`model`]): Homes, hubs and sub-devices. Each
//!   [`Device`] picks its hardware family once at construction and accepts
//!   status fragments through [`Device::apply`].
//!
//! - **[`CloudClient`]**: Domain-level facade over `homgar-api`: session,
//!   enumeration, per-hub polling, and the single owned push link with its
//!   subscription lifecycle.
//!
//! - **[`DeviceStore`]**: Reactive device table built on `DashMap` and
//!   `tokio::sync::watch`; readers take cheap snapshots or a
//!   [`DeviceTableStream`].
//!
//! - **[`Coordinator`]**: Merges periodic polling with push updates,
//!   keeps the push channel alive and renewed, and serializes control
//!   [`Command`]s.

pub mod cloud;
pub mod command;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod decode;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cloud::{CloudClient, ObserverError, PushObserver, SubscriptionScope};
pub use command::{Command, CommandResult};
pub use config::CoordinatorConfig;
pub use convert::PushUpdate;
pub use coordinator::{Coordinator, CoordinatorState};
pub use error::CoreError;
pub use store::{DeviceStore, DeviceTable};
pub use stream::{DeviceTableStream, DeviceTableWatchStream};

pub use homgar_api::{AuthCache, Credentials};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Device, DeviceRole, Home, Hub, ModelFamily, Reading, ReadingValue, Readings, StatusFragment,
    ZoneMode, ZoneStatus,
};
