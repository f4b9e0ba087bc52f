// Shared fixtures for homgar-core integration tests: a wiremock cloud
// and an in-memory push connector.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homgar_api::push::PushCredentials;
use homgar_api::{Credentials, Error, PushConnector, PushLink, PushMessage};
use homgar_core::CoordinatorConfig;

pub const HUB_MID: i64 = 200;
pub const FAR_FUTURE_MS: i64 = 4_102_444_800_000;

// ── Push connector ──────────────────────────────────────────────────

/// One session opened through [`FakeConnector`].
pub struct FakeSession {
    pub credentials: PushCredentials,
    pub messages: broadcast::Sender<Arc<PushMessage>>,
    pub connected: watch::Sender<bool>,
    pub cancel: CancellationToken,
}

impl FakeSession {
    /// Deliver a payload as if the broker had sent it.
    pub fn deliver(&self, seq: u64, payload: Value) {
        let Value::Object(map) = payload else {
            panic!("payload must be an object");
        };
        let message = PushMessage::from_payload("/sys/pk/dn/thing/event/property/post", seq, map);
        self.messages.send(Arc::new(message)).unwrap();
    }
}

#[derive(Default)]
struct FakeState {
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    refuse: AtomicBool,
    offline: AtomicBool,
}

/// Records every session it opens. Links report connected at once
/// unless [`set_offline`](Self::set_offline) is on.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<FakeState>,
}

impl FakeConnector {
    pub fn opens(&self) -> usize {
        self.sessions().len()
    }

    pub fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.state
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn session(&self, index: usize) -> Arc<FakeSession> {
        Arc::clone(&self.sessions()[index])
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }
}

impl PushConnector for FakeConnector {
    async fn open(
        &self,
        credentials: PushCredentials,
        cancel: CancellationToken,
    ) -> Result<PushLink, Error> {
        if self.state.refuse.load(Ordering::SeqCst) {
            return Err(Error::PushConnect("connection refused".into()));
        }
        let (messages, messages_rx) = broadcast::channel(16);
        let (connected, connected_rx) =
            watch::channel(!self.state.offline.load(Ordering::SeqCst));
        let link = PushLink::new(messages_rx, connected_rx, cancel.clone());

        self.state
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(FakeSession {
                credentials,
                messages,
                connected,
                cancel,
            }));
        Ok(link)
    }
}

// ── Cloud fixtures ──────────────────────────────────────────────────

pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "ok", "data": data }))
}

pub fn credentials() -> Credentials {
    Credentials::new("user@example.com", SecretString::from("password".to_owned()))
}

pub fn config(server: &MockServer) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::new(credentials());
    config.base_url = server.uri();
    config.poll_interval_secs = 0;
    config.push_health_timeout = Duration::from_millis(200);
    config
}

pub fn hub_json() -> Value {
    json!({
        "model": "HWS019WRF-V2",
        "modelCode": 289,
        "name": "Display",
        "did": 100,
        "mid": HUB_MID,
        "addr": 1,
        "portNumber": 0,
        "deviceName": "dn-hub",
        "productKey": "pk-hub",
        "subDevices": [
            { "model": "HCS014ARF", "modelCode": 262, "name": "Air", "did": 101, "mid": HUB_MID, "addr": 2, "portNumber": 0 },
            { "model": "HTV405FRF", "modelCode": 38, "name": "Timer", "did": 102, "mid": HUB_MID, "addr": 3, "portNumber": 4 }
        ]
    })
}

pub fn subscription_json(expire: i64) -> Value {
    json!({
        "deviceName": "push-dn",
        "productKey": "push-pk",
        "deviceSecret": "s3cret",
        "mqttHostUrl": "mqtt.example.com:1884",
        "expire": expire
    })
}

pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/basic/app/login"))
        .respond_with(ok(json!({
            "token": "tok-123",
            "tokenExpired": 86_400,
            "refreshToken": "ref-456"
        })))
        .mount(server)
        .await;
}

/// Mount one home with one display hub, an air sensor and a timer.
pub async fn mount_home(server: &MockServer) {
    mount_login(server).await;

    Mock::given(method("GET"))
        .and(path("/app/member/appHome/list"))
        .respond_with(ok(json!([{ "hid": 1, "homeName": "Garden" }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/app/device/getDeviceByHid"))
        .and(query_param("hid", "1"))
        .respond_with(ok(json!([hub_json()])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/app/device/getDeviceStatus"))
        .and(query_param("mid", "200"))
        .respond_with(ok(json!({
            "subDeviceStatus": [
                { "id": "connected", "value": "1" },
                { "id": "D01", "value": "1,-50,1;725(728/720/724),45(46/44/45),10130(10135/10120/10128)" },
                { "id": "D02", "value": "1,-61,1;10#005802750200000000006102008833003138" },
                { "id": "D03", "value": "1,-70,1;10#0A0B0C19D8200000" }
            ]
        })))
        .mount(server)
        .await;
}

pub async fn mount_subscription(server: &MockServer, expire: i64) {
    Mock::given(method("POST"))
        .and(path("/app/device/subscribeStatus"))
        .respond_with(ok(subscription_json(expire)))
        .mount(server)
        .await;
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
