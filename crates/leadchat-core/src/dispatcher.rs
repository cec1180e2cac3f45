//! Applies live stream events to the conversation store.
//!
//! The fetch path and this path share the same normalizer and the same
//! idempotent append, so a message that arrives both over the stream and in
//! a later page is stored once.

use tracing::debug;

use crate::error::{CoreError, Result};
use crate::models::{ConversationMetadata, Message, RawMessage};
use crate::pagination::{FetchRequest, PaginationController};
use crate::store::ConversationStore;
use crate::streaming::LiveEvent;

/// Apply one live event. Returns a fetch request when the event needs
/// authoritative data from the server (lead status changes).
pub fn dispatch(
    store: &mut ConversationStore,
    pager: &mut PaginationController,
    event: LiveEvent,
) -> Option<FetchRequest> {
    let outcome = match event {
        LiveEvent::IncomingMessage(raw) => apply_incoming(store, raw).map(|_| None),
        LiveEvent::AiReply(raw) => apply_ai_reply(store, raw).map(|_| None),
        LiveEvent::AiTyping { phone, typing } => {
            store.set_ai_typing(&phone, typing).map(|_| None)
        }
        LiveEvent::LeadStatusUpdate {
            phone,
            lead_status,
            lead_id,
        } => {
            let metadata = ConversationMetadata {
                lead_status: lead_status.map(Some),
                lead_id: lead_id.map(Some),
                ..Default::default()
            };
            if let Err(e) = store.upsert_conversation_metadata(&phone, metadata) {
                debug!(error = %e, "Lead status update without usable phone; refetching only");
            }
            Ok(pager.refresh())
        }
        LiveEvent::MessageStatus {
            message_id,
            status,
            phone,
        } => {
            if store.set_message_status(&message_id, status).is_none() {
                debug!(%message_id, phone = ?phone, "Status update for unknown message");
            }
            Ok(None)
        }
        LiveEvent::Unknown(kind) => {
            debug!(%kind, "Ignoring unknown live event");
            Ok(None)
        }
    };

    outcome.unwrap_or_else(|e| {
        debug!(error = %e, "Dropping live event");
        None
    })
}

fn message_phone(raw: &RawMessage) -> Result<String> {
    raw.phone_hint()
        .map(str::to_string)
        .ok_or_else(|| CoreError::InvalidPhone(String::new()))
}

fn apply_incoming(store: &mut ConversationStore, mut raw: RawMessage) -> Result<()> {
    if raw.direction.is_none() {
        raw.direction = Some("incoming".to_string());
    }
    let phone = message_phone(&raw)?;
    if raw.sender_name.is_none() {
        raw.sender_name = store.get(&phone).map(|c| c.display_name());
    }
    let appended = store.append_message(&phone, Message::from_raw(&raw))?;
    if appended {
        store.increment_unread(&phone)?;
    }
    Ok(())
}

fn apply_ai_reply(store: &mut ConversationStore, mut raw: RawMessage) -> Result<()> {
    if raw.is_ai.is_none() {
        raw.is_ai = Some(true);
    }
    let phone = message_phone(&raw)?;
    store.set_ai_typing(&phone, false)?;
    store.append_message(&phone, Message::from_raw(&raw))?;
    Ok(())
}
