//! Application-wide constants
//!
//! Centralized location for API paths, display defaults and tuning values
//! that are used across multiple modules.

/// Default backend base URL (overridden by `LEADCHAT_API_URL`)
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Page size for conversation lists
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Page size when lazily loading a conversation's transcript
pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 100;

/// Country calling code folded out of phone keys unless configured otherwise
pub const DEFAULT_COUNTRY_CODE: &str = "256";

// Display defaults
pub const AI_DISPLAY_NAME: &str = "Miryam";
pub const DEFAULT_ADMIN_NAME: &str = "Admin";
pub const DEFAULT_CUSTOMER_NAME: &str = "Customer";
pub const CONTACT_NAME_PREFIX: &str = "Contact ";

/// Prefix of client-generated ids for optimistic sends
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Default `messageType` for outgoing messages
pub const DEFAULT_MESSAGE_TYPE: &str = "text";

// Live stream reconnect policy
/// First reconnect delay after the stream drops
pub const RECONNECT_INITIAL_DELAY_SECS: u64 = 5;
/// Ceiling for the exponential reconnect delay
pub const RECONNECT_MAX_DELAY_SECS: u64 = 60;

// Environment variables
pub mod env {
    pub const API_URL: &str = "LEADCHAT_API_URL";
    pub const API_TOKEN: &str = "LEADCHAT_API_TOKEN";
    pub const ROLE: &str = "LEADCHAT_ROLE";
    pub const PAGE_SIZE: &str = "LEADCHAT_PAGE_SIZE";
    pub const COUNTRY_CODE: &str = "LEADCHAT_COUNTRY_CODE";
    pub const LOG_FILE: &str = "LEADCHAT_LOG_FILE";
}

// REST endpoints, relative to the configured base URL
pub mod paths {
    pub const CONVERSATIONS: &str = "/api/whatsapp/conversations";
    pub const SEND_MESSAGE: &str = "/api/whatsapp/send-message";
    pub const TOGGLE_AI: &str = "/api/whatsapp/ai/toggle-conversation";
    pub const MESSAGE_STREAM: &str = "/api/whatsapp/messages/stream";
}
