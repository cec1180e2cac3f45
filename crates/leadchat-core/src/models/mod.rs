pub mod conversation;
pub mod lead_status;
pub mod message;

pub use conversation::{Conversation, ConversationMetadata, RawConversation};
pub use lead_status::LeadStatus;
pub use message::{parse_timestamp, Message, MessageStatus, RawMessage, Sender};
