use serde::Serialize;

use crate::models::MessageStatus;
use crate::streaming::ConnectionState;

/// Change notifications produced by store mutations and drained by the
/// front end to decide what to re-render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// A conversation was created or its metadata changed
    ConversationUpdated { phone_number: String },
    /// Messages of a conversation changed; `active` is true when it is the
    /// one currently on screen
    TranscriptChanged { phone_number: String, active: bool },
    MessageStatusChanged {
        phone_number: String,
        message_id: String,
        status: MessageStatus,
    },
    ConversationRemoved { phone_number: String },
    ActiveChanged { phone_number: Option<String> },
    UnreadChanged { phone_number: String, unread_count: u32 },
    AiTyping { phone_number: String, typing: bool },
    Connection { state: ConnectionState },
}
