use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, Result};
use crate::events::CoreEvent;
use crate::models::{Conversation, ConversationMetadata, Message, MessageStatus};
use crate::phone::PhoneNormalizer;

/// Single source of truth for conversation state.
///
/// Conversations, the active selection and AI-typing flags all live here and
/// are only changed through the operations below. Every key passes through
/// the phone normalizer. The visible transcript is a borrow of the active
/// conversation, so it can never lag behind the store.
pub struct ConversationStore {
    normalizer: PhoneNormalizer,
    conversations: HashMap<String, Conversation>,
    active: Option<String>,
    ai_typing: HashSet<String>,
    changes: Vec<CoreEvent>,
}

impl ConversationStore {
    pub fn new(normalizer: PhoneNormalizer) -> Self {
        Self {
            normalizer,
            conversations: HashMap::new(),
            active: None,
            ai_typing: HashSet::new(),
            changes: Vec::new(),
        }
    }

    // ===== Keys =====

    pub fn normalize(&self, phone: &str) -> Option<String> {
        self.normalizer.normalize(Some(phone))
    }

    fn key(&self, phone: &str) -> Result<String> {
        self.normalize(phone)
            .ok_or_else(|| CoreError::InvalidPhone(phone.to_string()))
    }

    fn entry(&mut self, key: &str) -> &mut Conversation {
        if !self.conversations.contains_key(key) {
            self.changes.push(CoreEvent::ConversationUpdated {
                phone_number: key.to_string(),
            });
        }
        self.conversations
            .entry(key.to_string())
            .or_insert_with(|| Conversation::new(key.to_string()))
    }

    fn transcript_changed(&mut self, key: &str) {
        let active = self.active.as_deref() == Some(key);
        self.changes.push(CoreEvent::TranscriptChanged {
            phone_number: key.to_string(),
            active,
        });
    }

    // ===== Getters =====

    pub fn get(&self, phone: &str) -> Option<&Conversation> {
        let key = self.normalize(phone)?;
        self.conversations.get(&key)
    }

    pub fn contains(&self, phone: &str) -> bool {
        self.get(phone).is_some()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    pub fn active_phone(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_active(&self, phone: &str) -> bool {
        match (self.normalize(phone), self.active.as_deref()) {
            (Some(key), Some(active)) => key == active,
            _ => false,
        }
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active
            .as_ref()
            .and_then(|key| self.conversations.get(key))
    }

    /// Messages currently on screen
    pub fn active_transcript(&self) -> &[Message] {
        self.active_conversation()
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_ai_typing(&self, phone: &str) -> bool {
        self.normalize(phone)
            .map(|key| self.ai_typing.contains(&key))
            .unwrap_or(false)
    }

    /// Take all change notifications recorded since the last drain
    pub fn drain_changes(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.changes)
    }

    // ===== Mutations =====

    /// Create the conversation if needed and merge metadata into it.
    /// Returns the normalized key.
    pub fn upsert_conversation_metadata(
        &mut self,
        phone: &str,
        metadata: ConversationMetadata,
    ) -> Result<String> {
        let key = self.key(phone)?;
        let conv = self.entry(&key);
        let before = conv.clone();
        conv.apply_metadata(metadata);
        if *conv != before {
            self.changes.push(CoreEvent::ConversationUpdated {
                phone_number: key.clone(),
            });
        }
        Ok(key)
    }

    /// Insert a message in timestamp order. Idempotent by id: returns false
    /// when a message with the same id is already stored.
    pub fn append_message(&mut self, phone: &str, message: Message) -> Result<bool> {
        let key = self.key(phone)?;
        let conv = self.entry(&key);
        if conv.messages.iter().any(|m| m.id == message.id) {
            return Ok(false);
        }

        let pos = conv
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        conv.messages.insert(pos, message);
        conv.refresh_tail();
        self.transcript_changed(&key);
        Ok(true)
    }

    /// Replace the transcript with a freshly fetched one, keeping anything
    /// that only exists locally (live arrivals, pending sends).
    pub fn replace_messages(&mut self, phone: &str, fetched: Vec<Message>) -> Result<()> {
        let key = self.key(phone)?;
        let conv = self.entry(&key);

        let mut seen: HashSet<String> = HashSet::with_capacity(fetched.len());
        let mut merged: Vec<Message> = Vec::with_capacity(fetched.len() + conv.messages.len());
        for message in fetched.into_iter().chain(conv.messages.drain(..)) {
            if seen.insert(message.id.clone()) {
                merged.push(message);
            }
        }
        merged.sort_by_key(|m| m.timestamp);

        conv.messages = merged;
        conv.messages_loaded = true;
        conv.refresh_tail();
        self.transcript_changed(&key);
        Ok(())
    }

    /// Swap the first pending optimistic send with the same content for the
    /// server-confirmed message. Falls back to a plain append when nothing
    /// matches. Returns true when a pending message was replaced.
    pub fn reconcile_optimistic_message(
        &mut self,
        phone: &str,
        content: &str,
        server_message: Message,
    ) -> Result<bool> {
        let key = self.key(phone)?;
        let pos = self.conversations.get(&key).and_then(|conv| {
            conv.messages
                .iter()
                .position(|m| m.is_pending_send_of(content))
        });
        self.replace_pending(&key, pos, server_message)
    }

    /// Exact variant for servers that echo the client message id.
    /// Falls back to the content match when the id is unknown.
    pub fn reconcile_by_client_id(
        &mut self,
        phone: &str,
        client_id: &str,
        server_message: Message,
    ) -> Result<bool> {
        let key = self.key(phone)?;
        let pending = self.conversations.get(&key).and_then(|conv| {
            conv.messages
                .iter()
                .position(|m| m.is_optimistic() && m.client_id.as_deref() == Some(client_id))
        });

        if pending.is_none() {
            let content = server_message.content.clone();
            return self.reconcile_optimistic_message(&key, &content, server_message);
        }
        self.replace_pending(&key, pending, server_message)
    }

    fn replace_pending(
        &mut self,
        key: &str,
        pos: Option<usize>,
        mut server_message: Message,
    ) -> Result<bool> {
        let Some(pos) = pos else {
            self.append_message(key, server_message)?;
            return Ok(false);
        };

        let conv = self.entry(key);
        if conv.messages.iter().any(|m| m.id == server_message.id) {
            // Confirmed copy already arrived through another path
            conv.messages.remove(pos);
        } else {
            if server_message.status == MessageStatus::Sending {
                server_message.status = MessageStatus::Sent;
            }
            if server_message.client_id.is_none() {
                server_message.client_id = conv.messages[pos].client_id.clone();
            }
            conv.messages[pos] = server_message;
            conv.messages.sort_by_key(|m| m.timestamp);
        }
        conv.refresh_tail();
        self.transcript_changed(key);
        Ok(true)
    }

    /// Update a message's status wherever it lives. Status payloads do not
    /// always name the phone number, so every conversation is scanned.
    /// Returns the phone number of the updated conversation.
    pub fn set_message_status(&mut self, message_id: &str, status: MessageStatus) -> Option<String> {
        let (key, conv) = self
            .conversations
            .iter_mut()
            .find(|(_, conv)| conv.messages.iter().any(|m| m.id == message_id))?;

        if let Some(message) = conv.messages.iter_mut().find(|m| m.id == message_id) {
            message.status = status;
        }
        let key = key.clone();
        self.changes.push(CoreEvent::MessageStatusChanged {
            phone_number: key.clone(),
            message_id: message_id.to_string(),
            status,
        });
        Some(key)
    }

    /// Mark a pending send as failed in place so it stays visible for retry
    pub fn mark_failed(&mut self, phone: &str, message_id: &str) -> Result<bool> {
        let key = self.key(phone)?;
        let Some(message) = self
            .conversations
            .get_mut(&key)
            .and_then(|conv| conv.messages.iter_mut().find(|m| m.id == message_id))
        else {
            return Ok(false);
        };

        message.status = MessageStatus::Failed;
        self.changes.push(CoreEvent::MessageStatusChanged {
            phone_number: key,
            message_id: message_id.to_string(),
            status: MessageStatus::Failed,
        });
        Ok(true)
    }

    /// Empty the transcript but keep the conversation
    pub fn clear_messages(&mut self, phone: &str) -> Result<()> {
        let key = self.key(phone)?;
        let conv = self
            .conversations
            .get_mut(&key)
            .ok_or_else(|| CoreError::ConversationNotFound(key.clone()))?;

        conv.messages.clear();
        conv.messages_loaded = true;
        conv.refresh_tail();
        self.transcript_changed(&key);
        Ok(())
    }

    /// Delete the conversation entirely, dropping the active selection if it
    /// pointed here
    pub fn remove(&mut self, phone: &str) -> Option<Conversation> {
        let key = self.normalize(phone)?;
        let removed = self.conversations.remove(&key)?;
        self.ai_typing.remove(&key);

        if self.active.as_deref() == Some(key.as_str()) {
            self.active = None;
            self.changes
                .push(CoreEvent::ActiveChanged { phone_number: None });
        }
        self.changes
            .push(CoreEvent::ConversationRemoved { phone_number: key });
        Some(removed)
    }

    /// Open a conversation. Its unread count drops to zero; the previously
    /// active conversation keeps whatever count it had.
    pub fn set_active(&mut self, phone: Option<&str>) -> Result<()> {
        let key = match phone {
            Some(phone) => Some(self.key(phone)?),
            None => None,
        };

        if let Some(key) = &key {
            let conv = self.entry(key);
            if conv.unread_count != 0 {
                conv.unread_count = 0;
                self.changes.push(CoreEvent::UnreadChanged {
                    phone_number: key.clone(),
                    unread_count: 0,
                });
            }
        }

        if self.active != key {
            self.active = key.clone();
            self.changes
                .push(CoreEvent::ActiveChanged { phone_number: key });
        }
        Ok(())
    }

    /// Bump the unread counter unless the conversation is on screen.
    /// Returns the resulting count.
    pub fn increment_unread(&mut self, phone: &str) -> Result<u32> {
        let key = self.key(phone)?;
        if self.active.as_deref() == Some(key.as_str()) {
            return Ok(0);
        }

        let conv = self.entry(&key);
        conv.unread_count = conv.unread_count.saturating_add(1);
        let unread_count = conv.unread_count;
        self.changes.push(CoreEvent::UnreadChanged {
            phone_number: key,
            unread_count,
        });
        Ok(unread_count)
    }

    pub fn set_ai_typing(&mut self, phone: &str, typing: bool) -> Result<()> {
        let key = self.key(phone)?;
        let changed = if typing {
            self.ai_typing.insert(key.clone())
        } else {
            self.ai_typing.remove(&key)
        };
        if changed {
            self.changes.push(CoreEvent::AiTyping {
                phone_number: key,
                typing,
            });
        }
        Ok(())
    }

    pub fn set_ai_enabled(&mut self, phone: &str, enabled: bool) -> Result<()> {
        self.upsert_conversation_metadata(
            phone,
            ConversationMetadata {
                ai_enabled: Some(enabled),
                ..Default::default()
            },
        )
        .map(|_| ())
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(PhoneNormalizer::default())
    }
}
