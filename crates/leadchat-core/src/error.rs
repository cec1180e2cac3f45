use crate::permissions::Capability;

/// How a failure should be surfaced. None of these are fatal to the
/// application; each stays confined to the panel that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or backend failure: dismissible banner with manual refresh
    Transport,
    /// Missing capability: static "not permitted" message in place of the panel
    Permission,
    /// Malformed or partial response for one section
    PartialData,
    /// Bad caller input (unparseable phone, unknown conversation)
    Input,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid phone number: {0:?}")]
    InvalidPhone(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("No tab at index {0}")]
    UnknownTab(usize),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Not permitted: {0}")]
    PermissionDenied(Capability),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Transport(_) => ErrorCategory::Transport,
            CoreError::Api { status, .. } if *status == 401 || *status == 403 => {
                ErrorCategory::Permission
            }
            CoreError::Api { .. } => ErrorCategory::Transport,
            CoreError::Decode(_) => ErrorCategory::PartialData,
            CoreError::InvalidPhone(_)
            | CoreError::ConversationNotFound(_)
            | CoreError::UnknownTab(_)
            | CoreError::EmptyMessage => ErrorCategory::Input,
            CoreError::PermissionDenied(_) => ErrorCategory::Permission,
            CoreError::Config(_) => ErrorCategory::Input,
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
