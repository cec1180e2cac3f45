use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use leadchat_core::models::{Conversation, LeadStatus};
use leadchat_core::pagination::PageState;
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

/// One row of the conversation list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRow<'a> {
    pub phone_number: &'a str,
    pub display_name: String,
    pub lead_status: Option<&'a LeadStatus>,
    pub unread_count: u32,
    pub ai_enabled: bool,
    pub message_count: u32,
    pub last_message: Option<&'a str>,
    pub last_message_time: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Conversation> for ConversationRow<'a> {
    fn from(c: &'a Conversation) -> Self {
        Self {
            phone_number: &c.phone_number,
            display_name: c.display_name(),
            lead_status: c.lead_status.as_ref(),
            unread_count: c.unread_count,
            ai_enabled: c.ai_enabled,
            message_count: c.message_count,
            last_message: c.last_message.as_deref(),
            last_message_time: c.last_message_time,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationList<'a> {
    pub tab: usize,
    pub label: &'a str,
    pub page: Option<&'a PageState>,
    pub conversations: Vec<ConversationRow<'a>>,
}
