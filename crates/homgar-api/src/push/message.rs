// Push payload decoding.
//
// Payloads are JSON objects. Field updates live under `data`, with
// `params` accepted as a synonym; the device identifier is carried as
// `deviceId` or `mid`, either inside the update map or at the top level.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

use crate::models::scalar_to_string;

/// Process-wide delivery counter, stamped onto every decoded message.
static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// One decoded push message.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub topic: String,
    /// Delivery sequence number (process-wide, starts at 1).
    pub seq: u64,
    /// The full payload object, with `params` mirrored into `data`.
    pub payload: Map<String, Value>,
}

impl PushMessage {
    /// Decode a raw MQTT payload. Returns `None` for anything that is not
    /// a JSON object.
    pub fn decode(topic: &str, bytes: &[u8]) -> Option<Self> {
        let Ok(Value::Object(payload)) = serde_json::from_slice::<Value>(bytes) else {
            return None;
        };
        let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed) + 1;
        Some(Self::from_payload(topic, seq, payload))
    }

    /// Wrap an already-parsed payload, normalizing `params` into `data`.
    pub fn from_payload(topic: &str, seq: u64, mut payload: Map<String, Value>) -> Self {
        if !payload.contains_key("data") {
            if let Some(params) = payload.get("params").cloned() {
                payload.insert("data".to_owned(), params);
            }
        }
        Self {
            topic: topic.to_owned(),
            seq,
            payload,
        }
    }

    /// The field-update map, if the payload carries one.
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.payload.get("data").and_then(Value::as_object)
    }

    /// Identifier of the hub the update belongs to (`deviceId`, then `mid`).
    pub fn device_id(&self) -> Option<String> {
        let lookup = |map: &Map<String, Value>| {
            ["deviceId", "mid"]
                .iter()
                .filter_map(|key| map.get(*key))
                .filter_map(scalar_to_string)
                .find(|id| !id.is_empty())
        };
        self.data().and_then(lookup).or_else(|| lookup(&self.payload))
    }

    /// Field updates as `(status_id, raw_value)` pairs, ordered by key.
    ///
    /// Non-scalar values are skipped.
    pub fn fields(&self) -> Vec<(String, String)> {
        self.data()
            .map(|data| {
                data.iter()
                    .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.clone(), v)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn params_become_data() {
        let msg = PushMessage::from_payload(
            "/sys/pk/dn/thing/event/property/post",
            1,
            object(json!({ "params": { "mid": 42, "D02": "1,-60,1;10#00" } })),
        );
        assert_eq!(msg.device_id().as_deref(), Some("42"));
        assert_eq!(
            msg.fields(),
            vec![
                ("D02".to_owned(), "1,-60,1;10#00".to_owned()),
                ("mid".to_owned(), "42".to_owned()),
            ]
        );
    }

    #[test]
    fn existing_data_is_not_overwritten() {
        let msg = PushMessage::from_payload(
            "t",
            1,
            object(json!({ "data": { "deviceId": "7" }, "params": { "deviceId": "8" } })),
        );
        assert_eq!(msg.device_id().as_deref(), Some("7"));
    }

    #[test]
    fn device_id_falls_back_to_top_level() {
        let msg = PushMessage::from_payload(
            "t",
            1,
            object(json!({ "mid": "99", "data": { "connected": 1 } })),
        );
        assert_eq!(msg.device_id().as_deref(), Some("99"));
        assert_eq!(msg.fields(), vec![("connected".to_owned(), "1".to_owned())]);
    }

    #[test]
    fn non_object_payloads_are_dropped() {
        assert!(PushMessage::decode("t", b"not json").is_none());
        assert!(PushMessage::decode("t", b"[1,2,3]").is_none());
    }

    #[test]
    fn decode_stamps_increasing_sequence() {
        let a = PushMessage::decode("t", br#"{"data":{}}"#).unwrap();
        let b = PushMessage::decode("t", br#"{"data":{}}"#).unwrap();
        assert!(b.seq > a.seq);
        assert!(a.fields().is_empty());
        assert!(a.device_id().is_none());
    }
}
