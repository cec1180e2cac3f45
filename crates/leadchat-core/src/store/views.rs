//! Client-side filtering and sorting over conversations already loaded.
//! Nothing here requests more data from the server.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::Conversation;
use crate::search::{fields_contain_all_terms, parse_search_terms};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    LastMessageTime,
    Name,
    MessageCount,
    CreatedAt,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "last_message_time" | "recent" | "time" => Some(SortField::LastMessageTime),
            "name" => Some(SortField::Name),
            "message_count" | "messages" => Some(SortField::MessageCount),
            "created_at" | "created" => Some(SortField::CreatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Free-text search plus sort order for the conversation list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationQuery {
    pub search: String,
    pub sort: SortField,
    pub direction: SortDirection,
}

impl ConversationQuery {
    /// Search over display name, contact/lead names, phone and last message
    pub fn matches(&self, conversation: &Conversation) -> bool {
        let terms = parse_search_terms(&self.search);
        if terms.is_empty() {
            return true;
        }
        let display_name = conversation.display_name();
        let fields = [
            display_name.as_str(),
            conversation.contact_name.as_deref().unwrap_or(""),
            conversation.lead_name.as_deref().unwrap_or(""),
            conversation.last_message.as_deref().unwrap_or(""),
        ];
        fields_contain_all_terms(&fields, &conversation.phone_number, &terms)
    }

    fn compare(&self, a: &Conversation, b: &Conversation) -> Ordering {
        let ordering = match self.sort {
            SortField::LastMessageTime => a.last_message_time.cmp(&b.last_message_time),
            SortField::Name => a
                .display_name()
                .to_lowercase()
                .cmp(&b.display_name().to_lowercase()),
            SortField::MessageCount => a.message_count.cmp(&b.message_count),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let ordering = match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        // Stable tie-break so equal rows do not jump around between renders
        ordering.then_with(|| a.phone_number.cmp(&b.phone_number))
    }

    pub fn apply<'a, I>(&self, conversations: I) -> Vec<&'a Conversation>
    where
        I: IntoIterator<Item = &'a Conversation>,
    {
        let mut visible: Vec<&Conversation> = conversations
            .into_iter()
            .filter(|c| self.matches(c))
            .collect();
        visible.sort_by(|a, b| self.compare(a, b));
        visible
    }
}
