use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{RawConversation, RawMessage};
use crate::pagination::PageInfo;

/// Response of `GET /api/whatsapp/conversations`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub conversations: Vec<RawConversation>,
    #[serde(default)]
    pub pagination: PageInfo,
    pub error: Option<String>,
}

/// Response of `GET /api/whatsapp/conversations/:phone/messages`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub to: String,
    pub message: String,
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

/// Response of `POST /api/whatsapp/send-message`.
///
/// Backends differ in what they echo; anything missing is filled in from
/// the optimistic message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    #[serde(default)]
    pub success: bool,
    pub message_id: Option<String>,
    pub client_message_id: Option<String>,
    /// Either the stored message object or a human-readable status string
    #[serde(default)]
    pub message: Value,
    pub error: Option<String>,
}

impl SendMessageResponse {
    pub fn confirmed_message(&self) -> Option<RawMessage> {
        match &self.message {
            Value::Object(_) => serde_json::from_value(self.message.clone()).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleAiRequest {
    pub phone_number: String,
    pub enabled: bool,
}

/// Generic `{ success, error, message }` envelope for mutations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub message: Value,
}

/// Query for one page of conversations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationListQuery {
    pub limit: u32,
    pub offset: u32,
    pub status: Option<String>,
    pub include_closed: bool,
    /// Comma-joined on the wire
    pub lead_statuses: Vec<String>,
}

impl ConversationListQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(status) = &self.status {
            params.push(("status", status.clone()));
        }
        if self.include_closed {
            params.push(("includeClosed", "true".to_string()));
        }
        if !self.lead_statuses.is_empty() {
            params.push(("leadStatus", self.lead_statuses.join(",")));
        }
        params
    }
}
