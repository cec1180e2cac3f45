//! Role-gated capabilities.
//!
//! Every permission check in the crate goes through [`is_permitted`]. A
//! missing or unrecognized role is denied.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    Agent,
    Viewer,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Role::Owner,
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "agent" | "counselor" => Role::Agent,
            "viewer" => Role::Viewer,
            _ => Role::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewChats,
    SendMessages,
    ClearChats,
    DeleteConversations,
    ToggleAi,
}

impl Capability {
    fn key_name(&self) -> &'static str {
        match self {
            Capability::ViewChats => "view_chats",
            Capability::SendMessages => "send_messages",
            Capability::ClearChats => "clear_chats",
            Capability::DeleteConversations => "delete_conversations",
            Capability::ToggleAi => "toggle_ai",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_name())
    }
}

pub fn is_permitted(role: Option<&Role>, capability: Capability) -> bool {
    use Capability::*;

    let Some(role) = role else {
        return false;
    };

    match role {
        Role::Owner | Role::Admin | Role::Manager => true,
        Role::Agent => matches!(capability, ViewChats | SendMessages | ClearChats | ToggleAi),
        Role::Viewer => matches!(capability, ViewChats),
        Role::Unknown => false,
    }
}
