use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::{RecordError, RecordErrorKind};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub wa_id: String,
    pub user_info: UserInfo,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessageRequest {
    pub wa_id: String,
    pub name: String,
    pub message: String,
}

/// Result of decoding one poll response: the usable records plus whatever was rejected.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub rejected: Vec<RecordError>,
}

/// Accepts RFC 3339 and the offset-less form the backend emits for naive datetimes (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &'static str) -> Result<String, RecordErrorKind> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(RecordErrorKind::MissingField(key)),
    }
}

fn decode_fields(item: &Value) -> Result<Message, RecordErrorKind> {
    let obj = item.as_object().ok_or(RecordErrorKind::NotAnObject)?;

    let message_id = string_field(obj, "message_id")?;
    let wa_id = string_field(obj, "wa_id")?;
    if wa_id.trim().is_empty() {
        return Err(RecordErrorKind::EmptyWaId);
    }

    let raw_ts = string_field(obj, "timestamp")?;
    let timestamp =
        parse_timestamp(&raw_ts).ok_or_else(|| RecordErrorKind::InvalidTimestamp(raw_ts.clone()))?;

    let raw_status = string_field(obj, "status")?;
    let status =
        MessageStatus::parse(&raw_status).ok_or_else(|| RecordErrorKind::InvalidStatus(raw_status.clone()))?;

    let user_info = obj
        .get("user_info")
        .and_then(|v| serde_json::from_value::<UserInfo>(v.clone()).ok())
        .unwrap_or_default();
    let message = obj.get("message").and_then(|v| v.as_str()).unwrap_or_default().to_string();

    Ok(Message { message_id, wa_id, user_info, message, timestamp, status })
}

pub fn decode_record(index: usize, item: &Value) -> Result<Message, RecordError> {
    decode_fields(item).map_err(|kind| RecordError { index, kind })
}

pub fn decode_snapshot(items: &[Value]) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for (index, item) in items.iter().enumerate() {
        match decode_record(index, item) {
            Ok(msg) => snapshot.messages.push(msg),
            Err(err) => snapshot.rejected.push(err),
        }
    }
    snapshot
}
