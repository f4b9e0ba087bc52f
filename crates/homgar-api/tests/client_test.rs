#![allow(clippy::unwrap_used)]
// Integration tests for `HomgarClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homgar_api::models::SubDeviceRecord;
use homgar_api::{Credentials, Error, HomgarClient, TransportConfig, WorkModeCommand};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HomgarClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = HomgarClient::new(base_url, &TransportConfig::default()).unwrap();
    (server, client)
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "ok", "data": data }))
}

fn credentials() -> Credentials {
    Credentials::new("user@example.com", SecretString::from("password".to_owned()))
}

async fn mount_login(server: &MockServer) {
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

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_sends_hashed_password() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/basic/app/login"))
        .and(header("appCode", "1"))
        .and(header("lang", "en"))
        .and(body_partial_json(json!({
            "areaCode": "31",
            "phoneOrEmail": "user@example.com",
            "password": "5f4dcc3b5aa765d61d8327deb882cf99"
        })))
        .respond_with(ok(json!({
            "token": "tok-123",
            "tokenExpired": 86_400,
            "refreshToken": "ref-456"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = client.login(&credentials()).await.unwrap();

    assert_eq!(cache.email, "user@example.com");
    assert_eq!(cache.token, "tok-123");
    assert_eq!(cache.refresh_token.as_deref(), Some("ref-456"));
    assert!(cache.token_expires > chrono::Utc::now().timestamp() + 86_000);
    assert_eq!(client.session(), Some(cache));
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/basic/app/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 1001, "msg": "wrong password", "data": null })),
        )
        .mount(&server)
        .await;

    let result = client.login(&credentials()).await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(client.session().is_none());
}

#[tokio::test]
async fn test_ensure_session_reuses_valid_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/basic/app/login"))
        .respond_with(ok(json!({ "token": "tok", "tokenExpired": 86_400 })))
        .expect(1)
        .mount(&server)
        .await;

    client.ensure_session(&credentials()).await.unwrap();
    client.ensure_session(&credentials()).await.unwrap();
}

#[tokio::test]
async fn test_ensure_session_refreshes_near_expiry() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/basic/app/login"))
        .respond_with(ok(json!({ "token": "tok", "tokenExpired": 600 })))
        .expect(2)
        .mount(&server)
        .await;

    // 10-minute tokens are always inside the refresh margin.
    client.ensure_session(&credentials()).await.unwrap();
    client.ensure_session(&credentials()).await.unwrap();
}

// ── Enumeration tests ───────────────────────────────────────────────

#[tokio::test]
async fn test_list_homes_with_token() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/app/member/appHome/list"))
        .and(header("auth", "tok-123"))
        .respond_with(ok(json!([
            { "hid": 1, "homeName": "Garden" },
            { "hid": 2, "homeName": "Cabin" }
        ])))
        .mount(&server)
        .await;

    client.login(&credentials()).await.unwrap();
    let homes = client.list_homes().await.unwrap();

    assert_eq!(homes.len(), 2);
    assert_eq!(homes[0].hid, 1);
    assert_eq!(homes[1].home_name, "Cabin");
}

#[tokio::test]
async fn test_list_hubs_nests_sub_devices() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/app/device/getDeviceByHid"))
        .and(query_param("hid", "7"))
        .respond_with(ok(json!([{
            "model": "HWS019WRF-V2",
            "modelCode": 289,
            "name": "Display",
            "did": 100,
            "mid": 200,
            "addr": 1,
            "portNumber": 0,
            "deviceName": "dn-hub",
            "productKey": "pk-hub",
            "subDevices": [
                { "model": "HCS021FRF", "modelCode": 317, "name": "Bed", "did": 101, "mid": 200, "addr": 2, "portNumber": 0 },
                { "model": "HTV405FRF", "modelCode": 38, "name": "Timer", "did": 102, "mid": 200, "addr": 3, "portNumber": 4 }
            ]
        }])))
        .mount(&server)
        .await;

    let hubs = client.list_hubs(7).await.unwrap();

    assert_eq!(hubs.len(), 1);
    assert_eq!(hubs[0].model_code, 289);
    assert_eq!(hubs[0].product_key.as_deref(), Some("pk-hub"));
    assert_eq!(hubs[0].sub_devices.len(), 2);
    let timer: SubDeviceRecord = serde_json::from_value(hubs[0].sub_devices[1].clone()).unwrap();
    assert_eq!(timer.addr, 3);
    assert_eq!(timer.port_number, 4);
}

#[tokio::test]
async fn test_device_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/app/device/getDeviceStatus"))
        .and(query_param("mid", "200"))
        .respond_with(ok(json!({
            "subDeviceStatus": [
                { "id": "connected", "value": "1" },
                { "id": "D02", "value": "1,-55,1;10#DC0000004500" }
            ]
        })))
        .mount(&server)
        .await;

    let doc = client.device_status(200).await.unwrap();

    assert_eq!(doc.sub_device_status.len(), 2);
    assert_eq!(doc.sub_device_status[1].id, "D02");
}

#[tokio::test]
async fn test_empty_data_yields_empty_lists() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/app/member/appHome/list"))
        .respond_with(ok(serde_json::Value::Null))
        .mount(&server)
        .await;

    assert!(client.list_homes().await.unwrap().is_empty());
}

// ── Error handling ──────────────────────────────────────────────────

#[tokio::test]
async fn test_nonzero_code_is_tagged_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/app/member/appHome/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 1004, "msg": "token expired" })),
        )
        .mount(&server)
        .await;

    let err = client.list_homes().await.unwrap_err();

    assert_eq!(err.api_code(), Some(1004));
    assert!(matches!(err, Error::Api { ref message, .. } if message == "token expired"));
}

#[tokio::test]
async fn test_http_failure_carries_status_code() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/app/member/appHome/list"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client.list_homes().await.unwrap_err();

    assert_eq!(err.api_code(), Some(502));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_garbage_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/app/member/appHome/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.list_homes().await.unwrap_err();

    assert!(matches!(err, Error::Deserialization { ref body, .. } if body.contains("oops")));
}

// ── Control ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_control_work_mode_sequences_commands() {
    let (server, client) = setup().await;

    let command = WorkModeCommand {
        device_name: "dn-hub".into(),
        product_key: "pk-hub".into(),
        mid: 200,
        addr: 3,
        port: 2,
        mode: 1,
        duration: 600,
    };

    Mock::given(method("POST"))
        .and(path("/app/device/controlWorkMode"))
        .and(body_partial_json(json!({
            "deviceName": "dn-hub",
            "productKey": "pk-hub",
            "mid": "200",
            "addr": 3,
            "port": 2,
            "mode": 1,
            "duration": 600,
            "param": "1"
        })))
        .respond_with(ok(serde_json::Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/app/device/controlWorkMode"))
        .and(body_partial_json(json!({ "param": "2" })))
        .respond_with(ok(serde_json::Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    client.control_work_mode(&command).await.unwrap();
    client.control_work_mode(&command).await.unwrap();
}

// ── Push subscription ───────────────────────────────────────────────

#[tokio::test]
async fn test_subscribe_status_parses_broker_endpoint() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/app/device/subscribeStatus"))
        .and(body_partial_json(json!({
            "hid": 1,
            "hidList": [1, 2],
            "subscribe": [{ "deviceName": "dn-hub", "mid": "200", "productKey": "pk-hub" }],
            "unsubscribe": [],
            "userInfo": { "deviceType": 1, "notice": 0 }
        })))
        .respond_with(ok(json!({
            "deviceName": "push-dn",
            "productKey": "push-pk",
            "deviceSecret": "s3cret",
            "mqttHostUrl": "mqtt.example.com:1884",
            "expire": 4_102_444_800_000_i64
        })))
        .mount(&server)
        .await;

    let targets = vec![homgar_api::models::SubscribeTarget {
        device_name: "dn-hub".into(),
        mid: "200".into(),
        product_key: "pk-hub".into(),
    }];
    let sub = client.subscribe_status(1, &[1, 2], targets).await.unwrap();

    assert_eq!(sub.device_name, "push-dn");
    assert_eq!(sub.host, "mqtt.example.com");
    assert_eq!(sub.port, 1884);
    assert!(!sub.is_expired());

    let creds = sub.credentials().unwrap();
    assert_eq!(creds.username, "push-dn&push-pk");
}
