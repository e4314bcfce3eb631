//! Durable representation of the chat archive and its tolerant decoder.
//!
//! Writing goes through plain serde. Reading does not: archives come back
//! from disk after crashes and hand edits, so each channel key and message
//! is decoded individually and anything unsafe is dropped or defaulted
//! instead of failing the whole load.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::state::chat::{ChatMessage, ChatSender};
use crate::state::pad::PadId;

/// Root document written to the chat archive file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatArchiveDoc {
    /// Channels keyed by pad number.
    pub channels: BTreeMap<PadId, Vec<ChatMessageRecord>>,
}

/// Sending side as persisted on disk.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderRecord {
    /// Operator console.
    Admin,
    /// Judge bound to the pad.
    Judge,
}

/// One chat message as persisted on disk.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessageRecord {
    /// Message identifier.
    pub id: Uuid,
    /// Send instant, epoch ms.
    pub ts: i64,
    /// Sending side.
    pub from: SenderRecord,
    /// Message text.
    pub text: String,
    /// Urgency flag, omitted when false.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub urgent: bool,
    /// Acknowledgement instant, omitted while pending.
    #[serde(rename = "ackedAt", skip_serializing_if = "Option::is_none")]
    pub acked_at: Option<i64>,
}

impl From<&ChatMessage> for ChatMessageRecord {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            ts: message.ts,
            from: match message.from {
                ChatSender::Admin => SenderRecord::Admin,
                ChatSender::Judge => SenderRecord::Judge,
            },
            text: message.text.clone(),
            urgent: message.urgent,
            acked_at: message.acked_at,
        }
    }
}

/// Decode the archived channels out of a parsed JSON document.
///
/// Channel keys that are not strictly positive integers are skipped, as
/// are messages whose timestamp or text cannot be trusted. Urgency and
/// acknowledgement are never coerced from junk: anything that is not the
/// expected type decodes as "not urgent" and "not acknowledged".
pub fn channels_from_value(value: &Value) -> BTreeMap<PadId, Vec<ChatMessage>> {
    let mut channels = BTreeMap::new();
    let Some(raw_channels) = value.get("channels").and_then(Value::as_object) else {
        return channels;
    };
    for (key, raw_messages) in raw_channels {
        let Some(pad_id) = parse_channel_key(key) else {
            continue;
        };
        let Some(raw_messages) = raw_messages.as_array() else {
            continue;
        };
        let messages: Vec<ChatMessage> =
            raw_messages.iter().filter_map(message_from_value).collect();
        channels.insert(pad_id, messages);
    }
    channels
}

/// Parse a channel key as a strictly positive pad number.
///
/// Stricter than `u32::from_str`: no sign, no leading zero, digits only,
/// so keys like `"1.9"`, `"+1"` or `"01"` never collapse onto a real pad.
fn parse_channel_key(key: &str) -> Option<PadId> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) || key.starts_with('0') {
        return None;
    }
    key.parse::<PadId>().ok()
}

fn message_from_value(value: &Value) -> Option<ChatMessage> {
    let ts = finite_ms(value.get("ts")?)?;
    let text = value.get("text")?.as_str()?.to_owned();
    let from = match value.get("from").and_then(Value::as_str) {
        Some("JUDGE") => ChatSender::Judge,
        _ => ChatSender::Admin,
    };
    let urgent = matches!(value.get("urgent"), Some(Value::Bool(true)));
    let acked_at = value.get("ackedAt").and_then(finite_ms);
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .unwrap_or_else(Uuid::new_v4);
    Some(ChatMessage {
        id,
        ts,
        from,
        text,
        urgent,
        acked_at,
    })
}

/// Accept a JSON number as epoch milliseconds only when it is finite.
fn finite_ms(value: &Value) -> Option<i64> {
    let number = value.as_f64().filter(|n| n.is_finite())?;
    Some(number as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serialization_omits_quiet_fields() {
        let record = ChatMessageRecord {
            id: Uuid::nil(),
            ts: 42,
            from: SenderRecord::Admin,
            text: "hello".to_owned(),
            urgent: false,
            acked_at: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["from"], "ADMIN");
        assert!(value.get("urgent").is_none());
        assert!(value.get("ackedAt").is_none());

        let record = ChatMessageRecord {
            urgent: true,
            acked_at: Some(99),
            from: SenderRecord::Judge,
            ..record
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["urgent"], true);
        assert_eq!(value["ackedAt"], 99);
        assert_eq!(value["from"], "JUDGE");
    }

    #[test]
    fn channel_keys_must_be_plain_positive_integers() {
        let doc = json!({
            "channels": {
                "1": [{"ts": 1, "text": "ok", "from": "ADMIN"}],
                "1.9": [{"ts": 2, "text": "float key", "from": "ADMIN"}],
                "0": [{"ts": 3, "text": "zero", "from": "ADMIN"}],
                "01": [{"ts": 4, "text": "leading zero", "from": "ADMIN"}],
                "+2": [{"ts": 5, "text": "signed", "from": "ADMIN"}],
                "-3": [{"ts": 6, "text": "negative", "from": "ADMIN"}],
                "seven": [{"ts": 7, "text": "word", "from": "ADMIN"}]
            }
        });

        let channels = channels_from_value(&doc);
        assert_eq!(channels.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(channels[&1][0].text, "ok");
    }

    #[test]
    fn messages_with_untrustworthy_timestamps_are_dropped() {
        let doc = json!({
            "channels": {
                "4": [
                    {"ts": 1000, "text": "kept", "from": "JUDGE"},
                    {"ts": "NaN", "text": "string ts"},
                    {"ts": null, "text": "null ts"},
                    {"text": "missing ts"},
                    {"ts": 2000, "text": 17},
                    {"ts": 2500.75, "text": "float ts is fine"}
                ]
            }
        });

        let channels = channels_from_value(&doc);
        let texts: Vec<_> = channels[&4].iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["kept", "float ts is fine"]);
        assert_eq!(channels[&4][0].from, ChatSender::Judge);
        assert_eq!(channels[&4][1].ts, 2500);
    }

    #[test]
    fn urgency_and_ack_are_never_coerced() {
        let doc = json!({
            "channels": {
                "2": [
                    {"ts": 1, "text": "a", "urgent": "yes", "ackedAt": "soon"},
                    {"ts": 2, "text": "b", "urgent": 1, "ackedAt": true},
                    {"ts": 3, "text": "c", "urgent": true, "ackedAt": 500}
                ]
            }
        });

        let channels = channels_from_value(&doc);
        let messages = &channels[&2];
        assert!(!messages[0].urgent && messages[0].acked_at.is_none());
        assert!(!messages[1].urgent && messages[1].acked_at.is_none());
        assert!(messages[2].urgent);
        assert_eq!(messages[2].acked_at, Some(500));
    }

    #[test]
    fn unparseable_ids_are_replaced_not_fatal() {
        let doc = json!({
            "channels": {
                "3": [
                    {"ts": 1, "text": "a", "id": "not-a-uuid"},
                    {"ts": 2, "text": "b", "id": "7f2c1a44-9c41-4d0e-8d6b-2f61f34f71a5"}
                ]
            }
        });

        let channels = channels_from_value(&doc);
        assert_eq!(channels[&3].len(), 2);
        assert_eq!(
            channels[&3][1].id,
            Uuid::parse_str("7f2c1a44-9c41-4d0e-8d6b-2f61f34f71a5").unwrap()
        );
    }

    #[test]
    fn missing_or_malformed_root_yields_empty_channels() {
        assert!(channels_from_value(&json!({})).is_empty());
        assert!(channels_from_value(&json!([1, 2, 3])).is_empty());
        assert!(channels_from_value(&json!({"channels": "nope"})).is_empty());
    }
}
