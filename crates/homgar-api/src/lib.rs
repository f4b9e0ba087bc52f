//! Async client for the HomGar / RainPoint irrigation cloud.
//!
//! Two surfaces:
//!
//! - **REST** ([`HomgarClient`]): login, home/hub enumeration, per-hub
//!   status documents, work-mode commands and push-subscription issuance,
//!   all behind the cloud's `{code, msg, data}` envelope.
//! - **Push** ([`push`]): signed MQTT sessions on the vendor broker that
//!   deliver status changes as JSON documents.
//!
//! The crate returns wire-level records; `homgar-core` turns them into the
//! device model.

pub mod auth;
pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod push;
pub mod transport;

pub use auth::{AuthCache, Credentials, DEFAULT_AREA_CODE};
pub use client::{DEFAULT_BASE_URL, HomgarClient};
pub use devices::WorkModeCommand;
pub use error::Error;
pub use push::{MqttConnector, PushConnector, PushLink, PushMessage, Subscription};
pub use transport::TransportConfig;
