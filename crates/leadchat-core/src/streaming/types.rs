use serde::Deserialize;
use serde_json::Value;

use crate::models::{LeadStatus, MessageStatus, RawMessage};

/// One typed event from the live stream
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// A customer wrote to us
    IncomingMessage(RawMessage),
    /// The assistant answered a customer
    AiReply(RawMessage),
    AiTyping { phone: String, typing: bool },
    /// Lead status moved server-side. `lead_status` is whatever the payload
    /// carried, if anything.
    LeadStatusUpdate {
        phone: String,
        lead_status: Option<LeadStatus>,
        lead_id: Option<String>,
    },
    /// Delivery receipt for a message we sent
    MessageStatus {
        message_id: String,
        status: MessageStatus,
        phone: Option<String>,
    },
    /// Event type we do not handle
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingPayload {
    phone_number: Option<String>,
    from: Option<String>,
    is_typing: Option<bool>,
    typing: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeadStatusPayload {
    phone_number: Option<String>,
    lead_status: Option<LeadStatus>,
    status: Option<LeadStatus>,
    lead_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    message_id: Option<String>,
    id: Option<String>,
    status: String,
    phone_number: Option<String>,
}

impl LiveEvent {
    /// Parse one `{ type, data }` envelope
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        let envelope: Envelope = serde_json::from_str(payload)?;
        Self::from_envelope(&envelope.kind, envelope.data)
    }

    fn from_envelope(kind: &str, data: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            "incoming_message" => LiveEvent::IncomingMessage(message_payload(data)?),
            "ai_reply" => LiveEvent::AiReply(message_payload(data)?),
            "ai_typing" => {
                let p: TypingPayload = serde_json::from_value(data)?;
                LiveEvent::AiTyping {
                    phone: p.phone_number.or(p.from).unwrap_or_default(),
                    typing: p.is_typing.or(p.typing).unwrap_or(true),
                }
            }
            "lead_status_update" => {
                let p: LeadStatusPayload = serde_json::from_value(data)?;
                LiveEvent::LeadStatusUpdate {
                    phone: p.phone_number.unwrap_or_default(),
                    lead_status: p.lead_status.or(p.status),
                    lead_id: p.lead_id.filter(|id| !id.is_empty()),
                }
            }
            "message_status" => {
                let p: StatusPayload = serde_json::from_value(data)?;
                LiveEvent::MessageStatus {
                    message_id: p.message_id.or(p.id).unwrap_or_default(),
                    status: MessageStatus::parse(&p.status),
                    phone: p.phone_number,
                }
            }
            other => LiveEvent::Unknown(other.to_string()),
        })
    }
}

/// Message events either carry the message fields directly or nest them
/// under `message` next to a top-level `phoneNumber`
fn message_payload(data: Value) -> serde_json::Result<RawMessage> {
    if let Some(inner) = data.get("message").filter(|m| m.is_object()) {
        let mut raw: RawMessage = serde_json::from_value(inner.clone())?;
        if raw.phone_number.is_none() {
            raw.phone_number = data
                .get("phoneNumber")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        return Ok(raw);
    }
    serde_json::from_value(data)
}
