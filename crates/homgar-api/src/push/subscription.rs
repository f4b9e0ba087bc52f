// Push subscription issuance and MQTT credential derivation.
//
// `subscribeStatus` hands out a time-limited device identity on the
// vendor's IoT broker. The MQTT password is an HMAC-SHA1 signature over
// the identity, keyed with the issued device secret.

use std::fmt;
use std::fmt::Write as _;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::{debug, info};

use crate::client::HomgarClient;
use crate::error::Error;
use crate::models::{SubscribeData, SubscribeRequest, SubscribeTarget, SubscriberInfo};

/// Broker port used when `mqttHostUrl` carries none.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// A subscription within this many milliseconds of expiry counts as expired.
pub const EXPIRY_MARGIN_MS: i64 = 60_000;

/// Product key sent in the `userInfo` block of `subscribeStatus`.
pub const PUSH_PRODUCT_KEY: &str = "push_product_key_placeholder";

/// Topic suffixes subscribed under `/sys/{pk}/{dn}/`.
const TOPIC_SUFFIXES: [&str; 9] = [
    "thing/event/property/post",
    "thing/service/property/set",
    "thing/status/update",
    "thing/event/+/post",
    "thing/event/property/post_reply",
    "thing/event/property/batch/post",
    "thing/sub/status/update",
    "thing/sub/event/property/post",
    "thing/service/+/reply",
];

/// An issued push subscription.
#[derive(Clone, PartialEq, Eq)]
pub struct Subscription {
    pub device_name: String,
    pub product_key: String,
    pub device_secret: String,
    pub host: String,
    pub port: u16,
    /// Absolute expiry, epoch milliseconds.
    pub expires_at_ms: i64,
}

impl Subscription {
    /// Build from the `subscribeStatus` response.
    pub fn from_data(data: SubscribeData) -> Self {
        let (host, port) = split_host_port(&data.mqtt_host_url);
        Self {
            device_name: data.device_name,
            product_key: data.product_key,
            device_secret: data.device_secret,
            host,
            port,
            expires_at_ms: data.expire,
        }
    }

    /// Whether the subscription must be reissued at `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms - now_ms <= EXPIRY_MARGIN_MS
    }

    /// Whether the subscription must be reissued now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis())
    }

    /// Derive the signed MQTT connection parameters.
    pub fn credentials(&self) -> Result<PushCredentials, Error> {
        let dn = &self.device_name;
        let pk = &self.product_key;
        Ok(PushCredentials {
            host: self.host.clone(),
            port: self.port,
            client_id: format!("{dn}|securemode=3,signmethod=hmacsha1|"),
            username: format!("{dn}&{pk}"),
            password: sign_password(&self.device_secret, dn, pk)?,
            topics: topics(pk, dn),
        })
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("device_name", &self.device_name)
            .field("product_key", &self.product_key)
            .field("device_secret", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// Everything needed to open one MQTT session.
#[derive(Clone, PartialEq, Eq)]
pub struct PushCredentials {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub topics: Vec<String>,
}

impl fmt::Debug for PushCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("topics", &self.topics.len())
            .finish()
    }
}

/// Uppercase hex HMAC-SHA1 of `clientId{dn}deviceName{dn}productKey{pk}`.
pub fn sign_password(secret: &str, device_name: &str, product_key: &str) -> Result<String, Error> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::PushConnect(format!("invalid device secret: {e}")))?;
    mac.update(format!("clientId{device_name}deviceName{device_name}productKey{product_key}").as_bytes());
    Ok(format!("{:X}", mac.finalize().into_bytes()))
}

/// The fixed topic set for one push identity.
pub fn topics(product_key: &str, device_name: &str) -> Vec<String> {
    TOPIC_SUFFIXES
        .iter()
        .map(|suffix| format!("/sys/{product_key}/{device_name}/{suffix}"))
        .collect()
}

/// Split `host[:port]`, falling back to the default broker port.
fn split_host_port(raw: &str) -> (String, u16) {
    match raw.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_owned(), port),
            Err(_) => (raw.to_owned(), DEFAULT_MQTT_PORT),
        },
        None => (raw.to_owned(), DEFAULT_MQTT_PORT),
    }
}

impl HomgarClient {
    /// Request push credentials covering `targets`.
    ///
    /// `hid` is the primary home, `hid_list` every home of the account.
    pub async fn subscribe_status(
        &self,
        hid: i64,
        hid_list: &[i64],
        targets: Vec<SubscribeTarget>,
    ) -> Result<Subscription, Error> {
        let url = self.api_url("/app/device/subscribeStatus")?;
        let body = SubscribeRequest {
            hid,
            hid_list: hid_list.to_vec(),
            subscribe: targets,
            unsubscribe: Vec::new(),
            user_info: SubscriberInfo {
                device_name: subscriber_device_name(),
                device_type: 1,
                notice: 0,
                product_key: PUSH_PRODUCT_KEY.to_owned(),
                push_id: uuid::Uuid::new_v4().simple().to_string(),
            },
        };

        debug!(hid, hubs = body.subscribe.len(), "requesting push subscription");
        let data: SubscribeData = self.post(url, &body).await?;
        let subscription = Subscription::from_data(data);
        info!(
            host = %subscription.host,
            expires_at_ms = subscription.expires_at_ms,
            "push subscription issued"
        );
        Ok(subscription)
    }
}

/// 20 hex chars drawn from the random bytes of a v4 UUID, skipping the
/// version and variant bytes.
fn subscriber_device_name() -> String {
    let id = uuid::Uuid::new_v4();
    let (head, tail) = id.as_bytes().split_at(6);
    let mut name = String::with_capacity(20);
    for byte in head.iter().chain(tail.iter().skip(3).take(4)) {
        let _ = write!(name, "{byte:02x}");
    }
    name
}
