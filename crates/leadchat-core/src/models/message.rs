use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    AI_DISPLAY_NAME, DEFAULT_ADMIN_NAME, DEFAULT_CUSTOMER_NAME, DEFAULT_MESSAGE_TYPE,
    TEMP_ID_PREFIX,
};

/// Epoch values at or above this are treated as milliseconds
const EPOCH_MILLIS_THRESHOLD: u64 = 1_000_000_000_000;

/// Display role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Customer,
    Ai,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Lenient parse; anything unrecognized counts as `Sent`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sending" | "pending" | "queued" => MessageStatus::Sending,
            "delivered" => MessageStatus::Delivered,
            "read" | "seen" => MessageStatus::Read,
            "failed" | "error" => MessageStatus::Failed,
            _ => MessageStatus::Sent,
        }
    }
}

/// Canonical display record for one chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub sender_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub message_type: String,
    /// Client-generated id sent alongside an optimistic message, echoed back
    /// by servers that support exact reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Message payload as it arrives from the REST API or the live stream.
///
/// Shapes differ between endpoints, so every field is optional and aliases
/// are kept as separate fields rather than serde aliases (payloads sometimes
/// carry more than one of them).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: Option<String>,
    pub message_id: Option<String>,
    pub client_message_id: Option<String>,
    pub direction: Option<String>,
    #[serde(rename = "isAI", alias = "isAi")]
    pub is_ai: Option<bool>,
    pub sender_name: Option<String>,
    pub sender: Option<String>,
    pub content: Option<String>,
    pub message: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Value,
    #[serde(default)]
    pub created_at: Value,
    pub status: Option<String>,
    pub message_type: Option<String>,
    pub phone_number: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RawMessage {
    /// Phone number this payload belongs to, if the payload names one.
    /// Incoming messages carry `from`, outgoing ones `to`.
    pub fn phone_hint(&self) -> Option<&str> {
        self.phone_number
            .as_deref()
            .or_else(|| {
                if self.is_incoming() {
                    self.from.as_deref()
                } else {
                    self.to.as_deref()
                }
            })
            .or(self.from.as_deref())
            .or(self.to.as_deref())
    }

    pub fn is_incoming(&self) -> bool {
        self.direction
            .as_deref()
            .map(|d| d.eq_ignore_ascii_case("incoming"))
            .unwrap_or(false)
    }

    fn body(&self) -> String {
        self.content
            .as_ref()
            .or(self.message.as_ref())
            .or(self.text.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    fn server_id(&self) -> Option<String> {
        self.id
            .as_ref()
            .or(self.message_id.as_ref())
            .filter(|id| !id.is_empty())
            .cloned()
    }
}

impl Message {
    /// Normalize a raw payload.
    ///
    /// Role precedence: an incoming direction is always the customer; then an
    /// AI flag or the assistant's name; then an explicit `sender: customer`;
    /// everything else was typed by an admin.
    pub fn from_raw(raw: &RawMessage) -> Self {
        let is_ai = raw.is_ai == Some(true) || raw.sender_name.as_deref() == Some(AI_DISPLAY_NAME);
        let explicit_customer = raw
            .sender
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("customer"))
            .unwrap_or(false);

        let (sender, sender_name) = if raw.is_incoming() {
            let name = raw
                .sender_name
                .clone()
                .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_string());
            (Sender::Customer, name)
        } else if is_ai {
            (Sender::Ai, AI_DISPLAY_NAME.to_string())
        } else if explicit_customer {
            let name = raw
                .sender_name
                .clone()
                .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_string());
            (Sender::Customer, name)
        } else {
            let name = raw
                .sender_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string());
            (Sender::Admin, name)
        };

        let timestamp = if raw.timestamp.is_null() {
            parse_timestamp(&raw.created_at)
        } else {
            parse_timestamp(&raw.timestamp)
        };

        Message {
            id: raw
                .server_id()
                .unwrap_or_else(|| format!("local_{}", uuid::Uuid::new_v4())),
            sender,
            sender_name,
            content: raw.body(),
            timestamp,
            status: raw
                .status
                .as_deref()
                .map(MessageStatus::parse)
                .unwrap_or(MessageStatus::Sent),
            message_type: raw
                .message_type
                .clone()
                .unwrap_or_else(|| DEFAULT_MESSAGE_TYPE.to_string()),
            client_id: raw.client_message_id.clone(),
        }
    }

    /// Locally created admin message shown before the server confirms it.
    /// `stamp_millis` must be unique per send; it becomes the `temp_` id.
    pub fn optimistic(content: &str, sender_name: &str, stamp_millis: i64) -> Self {
        Message {
            id: format!("{}{}", TEMP_ID_PREFIX, stamp_millis),
            sender: Sender::Admin,
            sender_name: sender_name.to_string(),
            content: content.to_string(),
            timestamp: DateTime::from_timestamp_millis(stamp_millis).unwrap_or_else(Utc::now),
            status: MessageStatus::Sending,
            message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            client_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// True for a pending optimistic send with the given content
    pub fn is_pending_send_of(&self, content: &str) -> bool {
        self.sender == Sender::Admin
            && self.status == MessageStatus::Sending
            && self.is_optimistic()
            && self.content == content
    }
}

/// Parse any timestamp shape the backend emits. Never fails: unparseable
/// input yields the current instant.
///
/// Accepted: RFC 3339 strings, numeric strings, epoch numbers (seconds or
/// milliseconds), and `{ _seconds, _nanoseconds }` / `{ seconds, nanoseconds }`
/// objects.
pub fn parse_timestamp(value: &Value) -> DateTime<Utc> {
    try_parse_timestamp(value).unwrap_or_else(Utc::now)
}

fn try_parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.trim().parse::<i64>().ok().and_then(from_epoch)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch),
        Value::Object(map) => {
            let seconds = map
                .get("_seconds")
                .or_else(|| map.get("seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("_nanoseconds")
                .or_else(|| map.get("nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).unwrap_or(0))
        }
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}
