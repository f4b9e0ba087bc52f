// ── Push channel ──
//
// Subscription issuance, MQTT credential signing, the broker session,
// and payload decoding.

pub mod message;
pub mod subscription;
pub mod transport;

pub use message::PushMessage;
pub use subscription::{
    DEFAULT_MQTT_PORT, EXPIRY_MARGIN_MS, PushCredentials, Subscription, sign_password, topics,
};
pub use transport::{MqttConnector, PushConnector, PushLink, ReconnectConfig};
