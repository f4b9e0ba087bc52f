#![allow(clippy::unwrap_used)]
// Integration tests for the `homgar` CLI binary: argument parsing, config
// handling, and full runs against a wiremock cloud.

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// A `homgar` command isolated from the user's config and environment.
fn homgar_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("homgar");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG")
        .env_remove("HOMGAR_CONFIG")
        .env_remove("HOMGAR_EMAIL")
        .env_remove("HOMGAR_PASSWORD")
        .env_remove("HOMGAR_AREA_CODE")
        .env_remove("HOMGAR_API_BASE_URL")
        .env_remove("HOMGAR_AUTH_CACHE_PATH")
        .env_remove("HOMGAR_PUSH_ENABLED");
    cmd
}

/// A command wired to `server` with credentials and a private auth cache.
fn cloud_cmd(home: &Path, server: &MockServer) -> assert_cmd::Command {
    let mut cmd = homgar_cmd(home);
    cmd.env("HOMGAR_EMAIL", "user@example.com")
        .env("HOMGAR_PASSWORD", "correct-horse")
        .env("HOMGAR_API_BASE_URL", server.uri())
        .env("HOMGAR_AUTH_CACHE_PATH", home.join("auth.json"));
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "ok", "data": data }))
}

async fn mount_cloud(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/basic/app/login"))
        .respond_with(ok(json!({
            "token": "tok-123",
            "tokenExpired": 86_400,
            "refreshToken": "ref-456"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/app/member/appHome/list"))
        .respond_with(ok(json!([{ "hid": 1, "homeName": "Garden" }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/app/device/getDeviceByHid"))
        .and(query_param("hid", "1"))
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
                { "model": "HTV405FRF", "modelCode": 38, "name": "Timer", "did": 102, "mid": 200, "addr": 3, "portNumber": 4 }
            ]
        }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/app/device/getDeviceStatus"))
        .and(query_param("mid", "200"))
        .respond_with(ok(json!({
            "subDeviceStatus": [
                { "id": "connected", "value": "1" },
                { "id": "D03", "value": "1,-70,1;10#0A0B0C19D8200000" }
            ]
        })))
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = homgar_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    homgar_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("devices")
                .and(predicate::str::contains("watch"))
                .and(predicate::str::contains("zone"))
                .and(predicate::str::contains("config")),
        );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    homgar_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("homgar"));
}

#[test]
fn test_zone_number_is_range_checked() {
    let home = TempDir::new().unwrap();
    homgar_cmd(home.path())
        .args(["zone", "device_200_3", "5", "on"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("custom.toml");
    homgar_cmd(home.path())
        .args(["--config", file.to_str().unwrap(), "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_show_redacts_password() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("config.toml");
    std::fs::write(
        &file,
        "email = \"user@example.com\"\npassword = \"hunter2-secret\"\npoll_interval_secs = 45\n",
    )
    .unwrap();

    homgar_cmd(home.path())
        .args(["--config", file.to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("user@example.com")
                .and(predicate::str::contains("poll_interval_secs = 45"))
                .and(predicate::str::contains("********"))
                .and(predicate::str::contains("hunter2-secret").not()),
        );
}

#[test]
fn test_devices_without_credentials_fails_with_auth_code() {
    let home = TempDir::new().unwrap();
    let output = homgar_cmd(home.path()).arg("devices").output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("No credentials"));
}

// ── Cloud runs ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_json_lists_polled_devices_and_caches_session() {
    let server = MockServer::start().await;
    mount_cloud(&server).await;
    let home = TempDir::new().unwrap();

    let mut cmd = cloud_cmd(home.path(), &server);
    cmd.args(["devices", "--json"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let devices: Value = serde_json::from_slice(&output.stdout).unwrap();
    let keys: Vec<&str> = devices
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["device_200_3", "hub_200"]);
    assert_eq!(devices[0]["rssi"], -70);

    let cache: Value =
        serde_json::from_str(&std::fs::read_to_string(home.path().join("auth.json")).unwrap())
            .unwrap();
    assert_eq!(cache["token"], "tok-123");
    assert_eq!(cache["email"], "user@example.com");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_table_output() {
    let server = MockServer::start().await;
    mount_cloud(&server).await;
    let home = TempDir::new().unwrap();

    let mut cmd = cloud_cmd(home.path(), &server);
    cmd.arg("devices");
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("KEY"));
    assert!(stdout.contains("device_200_3"));
    assert!(stdout.contains("Display"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cached_session_skips_login() {
    let server = MockServer::start().await;
    mount_cloud(&server).await;
    let home = TempDir::new().unwrap();
    let far_future = 4_102_444_800_i64;
    std::fs::write(
        home.path().join("auth.json"),
        json!({
            "email": "user@example.com",
            "token": "cached-token",
            "token_expires": far_future,
            "refresh_token": null
        })
        .to_string(),
    )
    .unwrap();

    let mut cmd = cloud_cmd(home.path(), &server);
    cmd.arg("devices");
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let logins = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/auth/basic/app/login")
        .count();
    assert_eq!(logins, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_login_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/basic/app/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 1004, "msg": "wrong password", "data": null })),
        )
        .mount(&server)
        .await;
    let home = TempDir::new().unwrap();

    let mut cmd = cloud_cmd(home.path(), &server);
    cmd.arg("devices");
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(!home.path().join("auth.json").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_zone_on_sends_work_mode() {
    let server = MockServer::start().await;
    mount_cloud(&server).await;
    Mock::given(method("POST"))
        .and(path("/app/device/controlWorkMode"))
        .and(body_partial_json(json!({
            "addr": 3,
            "port": 2,
            "mode": 1,
            "duration": 120
        })))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    let home = TempDir::new().unwrap();

    let mut cmd = cloud_cmd(home.path(), &server);
    cmd.args(["zone", "device_200_3", "2", "on", "--duration", "120"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("switched on for 120s"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_zone_on_unknown_device_exits_not_found() {
    let server = MockServer::start().await;
    mount_cloud(&server).await;
    let home = TempDir::new().unwrap();

    let mut cmd = cloud_cmd(home.path(), &server);
    cmd.args(["zone", "device_200_9", "1", "off"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}
