use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lead_status::LeadStatus;
use super::message::{parse_timestamp, Message};
use crate::phone::fallback_contact_name;

/// One WhatsApp conversation, keyed by normalized phone number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub phone_number: String,
    pub contact_name: Option<String>,
    pub lead_name: Option<String>,
    pub lead_id: Option<String>,
    pub lead_status: Option<LeadStatus>,
    /// Server document id (used by delete-by-id)
    pub conversation_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Ascending by timestamp, unique by id
    pub messages: Vec<Message>,
    pub unread_count: u32,
    pub ai_enabled: bool,
    // Denormalized tail of `messages` (or the server summary until loaded)
    pub last_message_time: Option<DateTime<Utc>>,
    pub last_message: Option<String>,
    pub message_count: u32,
    /// Whether the full transcript has been fetched
    pub messages_loaded: bool,
}

impl Conversation {
    pub fn new(phone_number: String) -> Self {
        Self {
            phone_number,
            contact_name: None,
            lead_name: None,
            lead_id: None,
            lead_status: None,
            conversation_id: None,
            created_at: None,
            messages: Vec::new(),
            unread_count: 0,
            ai_enabled: true,
            last_message_time: None,
            last_message: None,
            message_count: 0,
            messages_loaded: false,
        }
    }

    /// Lead name, then contact name, then "Contact <last4>"
    pub fn display_name(&self) -> String {
        self.lead_name
            .as_ref()
            .or(self.contact_name.as_ref())
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| fallback_contact_name(&self.phone_number))
    }

    /// No lead linked, or explicitly marked as not a lead. A linked lead
    /// with no status yet is neither a non-lead nor in any status bucket.
    pub fn is_non_lead(&self) -> bool {
        self.lead_id.is_none() || self.lead_status == Some(LeadStatus::NoLead)
    }

    /// Recompute the denormalized tail fields from `messages`.
    ///
    /// Before the transcript is loaded the list only holds live arrivals, so
    /// the server's summary count is kept when it is larger.
    pub fn refresh_tail(&mut self) {
        match self.messages.last() {
            Some(last) => {
                self.last_message_time = Some(last.timestamp);
                self.last_message = Some(last.content.clone());
            }
            None if self.messages_loaded => {
                self.last_message_time = None;
                self.last_message = None;
            }
            None => {}
        }

        let len = u32::try_from(self.messages.len()).unwrap_or(u32::MAX);
        self.message_count = if self.messages_loaded {
            len
        } else {
            self.message_count.max(len)
        };
    }

    /// Merge metadata; every `Some` field overwrites the current value
    pub fn apply_metadata(&mut self, metadata: ConversationMetadata) {
        if let Some(name) = metadata.contact_name {
            self.contact_name = Some(name);
        }
        if let Some(name) = metadata.lead_name {
            self.lead_name = Some(name);
        }
        if let Some(lead_id) = metadata.lead_id {
            self.lead_id = lead_id;
        }
        if let Some(lead_status) = metadata.lead_status {
            self.lead_status = lead_status;
        }
        if let Some(id) = metadata.conversation_id {
            self.conversation_id = Some(id);
        }
        if let Some(created_at) = metadata.created_at {
            self.created_at = Some(created_at);
        }
        if let Some(enabled) = metadata.ai_enabled {
            self.ai_enabled = enabled;
        }

        // Summary fields only matter until the transcript is loaded
        if !self.messages_loaded && self.messages.is_empty() {
            if let Some(text) = metadata.last_message {
                self.last_message = Some(text);
            }
            if let Some(time) = metadata.last_message_time {
                self.last_message_time = Some(time);
            }
            if let Some(count) = metadata.message_count {
                self.message_count = count;
            }
        }
    }
}

/// Partial update for a conversation's metadata.
///
/// Lead fields are double options: `Some(None)` clears the value, `None`
/// leaves it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationMetadata {
    pub contact_name: Option<String>,
    pub lead_name: Option<String>,
    pub lead_id: Option<Option<String>>,
    pub lead_status: Option<Option<LeadStatus>>,
    pub conversation_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub ai_enabled: Option<bool>,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub message_count: Option<u32>,
}

/// Conversation summary as returned by the conversations endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConversation {
    pub id: Option<String>,
    pub phone_number: Option<String>,
    pub contact_name: Option<String>,
    pub lead_name: Option<String>,
    pub lead_id: Option<String>,
    pub lead_status: Option<LeadStatus>,
    pub ai_enabled: Option<bool>,
    /// Either a plain string or a message object
    #[serde(default)]
    pub last_message: Value,
    #[serde(default)]
    pub last_message_time: Value,
    pub message_count: Option<u32>,
    pub unread_count: Option<u32>,
    #[serde(default)]
    pub created_at: Value,
    pub status: Option<String>,
}

impl RawConversation {
    /// The page is authoritative for lead fields, so absent values clear them
    pub fn to_metadata(&self) -> ConversationMetadata {
        let last_message = match &self.last_message {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => ["content", "message", "text"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        };

        ConversationMetadata {
            contact_name: self.contact_name.clone(),
            lead_name: self.lead_name.clone(),
            lead_id: Some(self.lead_id.clone().filter(|id| !id.is_empty())),
            lead_status: Some(self.lead_status.clone()),
            conversation_id: self.id.clone(),
            created_at: (!self.created_at.is_null()).then(|| parse_timestamp(&self.created_at)),
            ai_enabled: self.ai_enabled,
            last_message,
            last_message_time: (!self.last_message_time.is_null())
                .then(|| parse_timestamp(&self.last_message_time)),
            message_count: self.message_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{MessageStatus, Sender};
    use serde_json::json;

    fn message(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            sender: Sender::Customer,
            sender_name: "Customer".to_string(),
            content: format!("content {}", id),
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            status: MessageStatus::Delivered,
            message_type: "text".to_string(),
            client_id: None,
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut conv = Conversation::new("700123456".to_string());
        assert_eq!(conv.display_name(), "Contact 3456");

        conv.contact_name = Some("Amina".to_string());
        assert_eq!(conv.display_name(), "Amina");

        conv.lead_name = Some("Amina K.".to_string());
        assert_eq!(conv.display_name(), "Amina K.");
    }

    #[test]
    fn test_non_lead_detection() {
        let mut conv = Conversation::new("1".to_string());
        assert!(conv.is_non_lead());

        conv.lead_id = Some("lead-1".to_string());
        conv.lead_status = Some(LeadStatus::NoLead);
        assert!(conv.is_non_lead());

        conv.lead_status = Some(LeadStatus::Applied);
        assert!(!conv.is_non_lead());
    }

    #[test]
    fn test_refresh_tail_loaded_and_unloaded() {
        let mut conv = Conversation::new("1".to_string());
        conv.message_count = 40;
        conv.messages.push(message("a", 10));
        conv.refresh_tail();
        assert_eq!(conv.message_count, 40, "summary count kept before load");
        assert_eq!(conv.last_message.as_deref(), Some("content a"));

        conv.messages_loaded = true;
        conv.refresh_tail();
        assert_eq!(conv.message_count, 1);

        conv.messages.clear();
        conv.refresh_tail();
        assert_eq!(conv.message_count, 0);
        assert!(conv.last_message.is_none());
        assert!(conv.last_message_time.is_none());
    }

    #[test]
    fn test_metadata_merge_is_per_field() {
        let mut conv = Conversation::new("1".to_string());
        conv.contact_name = Some("Old".to_string());
        conv.lead_id = Some("lead-1".to_string());

        conv.apply_metadata(ConversationMetadata {
            lead_status: Some(Some(LeadStatus::Inquiry)),
            ai_enabled: Some(false),
            ..Default::default()
        });

        assert_eq!(conv.contact_name.as_deref(), Some("Old"));
        assert_eq!(conv.lead_id.as_deref(), Some("lead-1"));
        assert_eq!(conv.lead_status, Some(LeadStatus::Inquiry));
        assert!(!conv.ai_enabled);

        conv.apply_metadata(ConversationMetadata {
            lead_id: Some(None),
            ..Default::default()
        });
        assert!(conv.lead_id.is_none());
    }

    #[test]
    fn test_raw_conversation_to_metadata() {
        let raw: RawConversation = serde_json::from_value(json!({
            "id": "conv-9",
            "phoneNumber": "+256700123456",
            "contactName": "Amina",
            "leadId": "lead-1",
            "leadStatus": "APPLIED",
            "lastMessage": { "content": "see you", "timestamp": 1 },
            "lastMessageTime": { "_seconds": 1_700_000_000, "_nanoseconds": 0 },
            "messageCount": 12
        }))
        .unwrap();

        let meta = raw.to_metadata();
        assert_eq!(meta.conversation_id.as_deref(), Some("conv-9"));
        assert_eq!(meta.lead_id, Some(Some("lead-1".to_string())));
        assert_eq!(meta.lead_status, Some(Some(LeadStatus::Applied)));
        assert_eq!(meta.last_message.as_deref(), Some("see you"));
        assert_eq!(
            meta.last_message_time,
            DateTime::from_timestamp(1_700_000_000, 0)
        );
        assert_eq!(meta.message_count, Some(12));
        assert!(meta.created_at.is_none());
    }

    #[test]
    fn test_raw_conversation_without_lead_clears_lead() {
        let raw: RawConversation =
            serde_json::from_value(json!({ "phoneNumber": "1", "leadId": "" })).unwrap();
        let meta = raw.to_metadata();
        assert_eq!(meta.lead_id, Some(None));
        assert_eq!(meta.lead_status, Some(None));
    }
}
