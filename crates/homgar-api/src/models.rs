// Wire types for the HomGar cloud REST API.
//
// Field names follow the cloud's camelCase JSON. Numeric identifiers are
// kept as integers; status values arrive as strings or numbers and are
// normalized to strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The `{code, msg, data}` envelope wrapping every response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

// ── Authentication ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub area_code: &'a str,
    pub phone_or_email: &'a str,
    /// MD5 hex digest of the account password.
    pub password: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    /// Token lifetime in seconds, relative to the login time.
    pub token_expired: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

// ── Enumeration ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeRecord {
    pub hid: i64,
    #[serde(default)]
    pub home_name: String,
}

/// A hub as returned by `getDeviceByHid`, with its sub-devices nested.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubRecord {
    #[serde(default)]
    pub model: Option<String>,
    pub model_code: i64,
    #[serde(default)]
    pub name: String,
    pub did: i64,
    pub mid: i64,
    #[serde(default)]
    pub addr: u8,
    #[serde(default)]
    pub port_number: u32,
    #[serde(default)]
    pub soft_ver: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub product_key: Option<String>,
    #[serde(default)]
    pub alerts: Option<Value>,
    /// Raw entries, parsed one at a time into [`SubDeviceRecord`] so a
    /// malformed entry cannot fail the whole hub list.
    #[serde(default)]
    pub sub_devices: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubDeviceRecord {
    #[serde(default)]
    pub model: Option<String>,
    pub model_code: i64,
    #[serde(default)]
    pub name: String,
    pub did: i64,
    pub mid: i64,
    pub addr: u8,
    #[serde(default)]
    pub port_number: u32,
    #[serde(default)]
    pub soft_ver: Option<String>,
    #[serde(default)]
    pub alerts: Option<Value>,
}

// ── Status ──────────────────────────────────────────────────────────

/// Status document for one hub (`getDeviceStatus`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDocument {
    #[serde(default)]
    pub sub_device_status: Vec<StatusEntry>,
}

/// One `{id, value}` status fragment on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusEntry {
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

// ── Control ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkModeRequest {
    pub device_name: String,
    pub product_key: String,
    /// Hub id, sent as a string.
    pub mid: String,
    pub addr: u8,
    pub port: u8,
    pub mode: u8,
    pub duration: u32,
    /// Command sequence number, sent as a string.
    pub param: String,
}

// ── Push subscription ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub hid: i64,
    pub hid_list: Vec<i64>,
    pub subscribe: Vec<SubscribeTarget>,
    pub unsubscribe: Vec<SubscribeTarget>,
    pub user_info: SubscriberInfo,
}

/// A hub the subscription should cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeTarget {
    pub device_name: String,
    /// Hub id, sent as a string.
    pub mid: String,
    pub product_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberInfo {
    pub device_name: String,
    pub device_type: u8,
    pub notice: u8,
    pub product_key: String,
    pub push_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeData {
    pub device_name: String,
    pub product_key: String,
    pub device_secret: String,
    pub mqtt_host_url: String,
    /// Absolute expiry as epoch milliseconds.
    #[serde(default)]
    pub expire: i64,
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Render a JSON scalar as the string the status grammar expects.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(u8::from(*b).to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value).unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_value_accepts_numbers() {
        let doc: StatusDocument = serde_json::from_value(json!({
            "subDeviceStatus": [
                { "id": "connected", "value": 1 },
                { "id": "D02", "value": "1,-60,1;10#00" },
                { "id": "state", "value": null }
            ]
        }))
        .unwrap();

        assert_eq!(doc.sub_device_status[0].value, "1");
        assert_eq!(doc.sub_device_status[1].value, "1,-60,1;10#00");
        assert_eq!(doc.sub_device_status[2].value, "");
    }

    #[test]
    fn hub_record_defaults_missing_fields() {
        let hub: HubRecord = serde_json::from_value(json!({
            "modelCode": 289,
            "did": 10,
            "mid": 20
        }))
        .unwrap();

        assert_eq!(hub.model_code, 289);
        assert!(hub.sub_devices.is_empty());
        assert!(hub.product_key.is_none());
        assert_eq!(hub.port_number, 0);
    }

    #[test]
    fn hub_record_keeps_malformed_sub_devices_raw() {
        let hub: HubRecord = serde_json::from_value(json!({
            "modelCode": 289,
            "did": 10,
            "mid": 20,
            "subDevices": [
                { "modelCode": 9999, "name": "Unsupported valve", "mid": 20 },
                { "modelCode": 38, "did": 11, "mid": 20, "addr": 300 }
            ]
        }))
        .unwrap();

        assert_eq!(hub.sub_devices.len(), 2);
        assert!(serde_json::from_value::<SubDeviceRecord>(hub.sub_devices[0].clone()).is_err());
        assert!(serde_json::from_value::<SubDeviceRecord>(hub.sub_devices[1].clone()).is_err());
    }

    #[test]
    fn subscribe_request_uses_camel_case() {
        let req = SubscribeRequest {
            hid: 1,
            hid_list: vec![1, 2],
            subscribe: vec![SubscribeTarget {
                device_name: "MAC-5".into(),
                mid: "5".into(),
                product_key: "pk".into(),
            }],
            unsubscribe: Vec::new(),
            user_info: SubscriberInfo {
                device_name: "abc".into(),
                device_type: 1,
                notice: 0,
                product_key: "pk".into(),
                push_id: "id".into(),
            },
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["hidList"], json!([1, 2]));
        assert_eq!(value["subscribe"][0]["deviceName"], "MAC-5");
        assert_eq!(value["subscribe"][0]["mid"], "5");
        assert_eq!(value["userInfo"]["pushId"], "id");
    }
}
