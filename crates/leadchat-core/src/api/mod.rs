//! REST access to the WhatsApp backend.

mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{
    AckResponse, ConversationListQuery, ConversationsResponse, MessagesResponse,
    SendMessageRequest, SendMessageResponse, ToggleAiRequest,
};
