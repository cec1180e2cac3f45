use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ConversationListQuery, ConversationsResponse, SendMessageRequest};
use crate::config::CoreConfig;
use crate::constants::DEFAULT_MESSAGE_TYPE;
use crate::dispatcher::dispatch;
use crate::error::{CoreError, Result};
use crate::events::CoreEvent;
use crate::models::{Conversation, Message, MessageStatus, Sender};
use crate::pagination::{FetchRequest, ListFilter, PaginationController};
use crate::partition::{TabCount, TabPartitioner};
use crate::permissions::{is_permitted, Capability, Role};
use crate::store::{ConversationQuery, ConversationStore, SortDirection, SortField};
use crate::streaming::{ConnectionState, EventStreamClient, ReconnectPolicy, StreamMessage};

const STREAM_CHANNEL_CAPACITY: usize = 256;

/// Panels that keep their own error so one failure does not blank the rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    List,
    Transcript,
    Send,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PanelErrors {
    pub list: Option<String>,
    pub transcript: Option<String>,
    pub send: Option<String>,
}

impl PanelErrors {
    fn slot(&mut self, panel: Panel) -> &mut Option<String> {
        match panel {
            Panel::List => &mut self.list,
            Panel::Transcript => &mut self.transcript,
            Panel::Send => &mut self.send,
        }
    }

    pub fn get(&self, panel: Panel) -> Option<&str> {
        match panel {
            Panel::List => self.list.as_deref(),
            Panel::Transcript => self.transcript.as_deref(),
            Panel::Send => self.send.as_deref(),
        }
    }
}

/// Owns every piece of chat state and drives it from one task.
///
/// Fetches, sends and live events all mutate the same store, so the
/// conversation list, tab counts and the open transcript agree with each
/// other at every await point.
pub struct ChatRuntime {
    api: ApiClient,
    store: ConversationStore,
    partitioner: TabPartitioner,
    pager: PaginationController,
    errors: PanelErrors,
    role: Option<Role>,
    admin_name: String,
    message_page_size: u32,
    reconnect: ReconnectPolicy,
    connection: ConnectionState,
    last_temp_stamp: i64,
    pending: Vec<CoreEvent>,
}

impl ChatRuntime {
    pub fn new(config: &CoreConfig) -> Self {
        Self::with_partitioner(config, TabPartitioner::admissions())
    }

    pub fn with_partitioner(config: &CoreConfig, partitioner: TabPartitioner) -> Self {
        let pager = PaginationController::new(&partitioner, config.page_size);
        Self {
            api: ApiClient::from_config(config),
            store: ConversationStore::new(config.phone_normalizer()),
            partitioner,
            pager,
            errors: PanelErrors::default(),
            role: config.role.clone(),
            admin_name: config.admin_name.clone(),
            message_page_size: config.message_page_size,
            reconnect: config.reconnect,
            connection: ConnectionState::Disconnected { retry_in_secs: 0 },
            last_temp_stamp: 0,
            pending: Vec::new(),
        }
    }

    // ===== Getters =====

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn partitioner(&self) -> &TabPartitioner {
        &self.partitioner
    }

    pub fn pager(&self) -> &PaginationController {
        &self.pager
    }

    /// Direct access for callers that run fetches concurrently and hand
    /// results back through `apply_page`
    pub fn pager_mut(&mut self) -> &mut PaginationController {
        &mut self.pager
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn errors(&self) -> &PanelErrors {
        &self.errors
    }

    pub fn dismiss_error(&mut self, panel: Panel) {
        *self.errors.slot(panel) = None;
        if panel == Panel::List {
            self.pager.dismiss_error(self.pager.active_tab());
        }
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    pub fn can(&self, capability: Capability) -> bool {
        is_permitted(self.role.as_ref(), capability)
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied(capability))
        }
    }

    /// Everything that changed since the last call, in order
    pub fn drain_changes(&mut self) -> Vec<CoreEvent> {
        let mut changes = self.store.drain_changes();
        changes.append(&mut self.pending);
        changes
    }

    // ===== Views =====

    pub fn tab_counts(&self) -> Vec<TabCount> {
        self.partitioner.counts(&self.store)
    }

    /// Conversations of the active tab after client-side search and sort.
    /// Bucket membership is read from live metadata, so a conversation whose
    /// lead status just moved disappears from its old tab immediately.
    pub fn visible_conversations(
        &self,
        sort: SortField,
        direction: SortDirection,
    ) -> Vec<&Conversation> {
        let tab = self.pager.active_tab();
        let query = ConversationQuery {
            search: self.pager.search().to_string(),
            sort,
            direction,
        };
        query.apply(
            self.store
                .conversations()
                .filter(|c| self.partitioner.in_bucket(c, tab)),
        )
    }

    // ===== Conversation list =====

    pub async fn select_tab(&mut self, tab: usize) -> Result<()> {
        self.require(Capability::ViewChats)?;
        let request = self.pager.select_tab(tab).ok_or(CoreError::UnknownTab(tab))?;
        self.execute(request).await
    }

    /// Tab switch and search change as a single fetch
    pub async fn select_tab_with_search(&mut self, tab: usize, search: &str) -> Result<()> {
        self.require(Capability::ViewChats)?;
        let request = self
            .pager
            .select_tab_with_search(tab, search)
            .ok_or(CoreError::UnknownTab(tab))?;
        self.execute(request).await
    }

    pub async fn set_search(&mut self, search: &str) -> Result<()> {
        self.require(Capability::ViewChats)?;
        match self.pager.set_search(search) {
            Some(request) => self.execute(request).await,
            None => Ok(()),
        }
    }

    pub async fn set_filter(&mut self, filter: ListFilter) -> Result<()> {
        self.require(Capability::ViewChats)?;
        match self.pager.set_filter(filter) {
            Some(request) => self.execute(request).await,
            None => Ok(()),
        }
    }

    /// Next page of the active tab. Returns false when nothing was requested.
    pub async fn load_more(&mut self) -> Result<bool> {
        self.require(Capability::ViewChats)?;
        match self.pager.load_more() {
            Some(request) => self.execute(request).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Keep loading pages of the active tab until the server has no more
    pub async fn load_all(&mut self) -> Result<()> {
        while self.load_more().await? {}
        Ok(())
    }

    /// Manual refresh of the active tab; also the retry after a failure
    pub async fn refresh(&mut self) -> Result<()> {
        self.require(Capability::ViewChats)?;
        match self.pager.refresh() {
            Some(request) => self.execute(request).await,
            None => Ok(()),
        }
    }

    /// First page of every tab, so tab counts cover the whole inbox.
    ///
    /// A failing tab keeps its error in its own page state and does not stop
    /// the others. Returns the tabs that failed.
    pub async fn refresh_all_tabs(&mut self) -> Result<Vec<usize>> {
        self.require(Capability::ViewChats)?;
        let mut failed = Vec::new();
        for tab in 0..self.partitioner.len() {
            if let Some(request) = self.pager.refresh_tab(tab) {
                if let Err(e) = self.execute(request).await {
                    debug!(tab, error = %e, "Tab refresh failed; continuing");
                    failed.push(tab);
                }
            }
        }
        Ok(failed)
    }

    /// Run one page request against the API and apply the outcome
    pub async fn execute(&mut self, request: FetchRequest) -> Result<()> {
        let query = ConversationListQuery {
            limit: request.limit,
            offset: request.offset,
            status: request.filter.status.clone(),
            include_closed: request.filter.include_closed,
            lead_statuses: request
                .lead_statuses
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        };
        let result = self.api.list_conversations(&query).await;
        self.apply_page(&request, result)
    }

    /// Apply a page response. Stale responses are dropped without touching
    /// the store.
    pub fn apply_page(
        &mut self,
        request: &FetchRequest,
        result: Result<ConversationsResponse>,
    ) -> Result<()> {
        if !self.pager.is_current(request) {
            debug!(tab = request.tab, generation = request.generation, "Ignoring stale page");
            return Ok(());
        }

        match result {
            Ok(response) => {
                let mut phones = Vec::with_capacity(response.conversations.len());
                for raw in &response.conversations {
                    let Some(phone) = raw.phone_number.as_deref() else {
                        debug!(id = ?raw.id, "Skipping conversation without phone number");
                        continue;
                    };
                    match self.store.upsert_conversation_metadata(phone, raw.to_metadata()) {
                        Ok(key) => phones.push(key),
                        Err(e) => debug!(error = %e, "Skipping conversation"),
                    }
                }
                self.pager
                    .apply_response(request, phones, &response.pagination);
                if request.tab == self.pager.active_tab() {
                    self.errors.list = None;
                }
                Ok(())
            }
            Err(e) => {
                warn!(tab = request.tab, error = %e, "Failed to load conversations");
                self.pager.apply_failure(request, &e.to_string());
                if request.tab == self.pager.active_tab() {
                    self.errors.list = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    // ===== Transcript =====

    /// Make a conversation active, zero its unread count and load its
    /// transcript the first time it is opened
    pub async fn open_conversation(&mut self, phone: &str) -> Result<()> {
        self.require(Capability::ViewChats)?;
        self.store.set_active(Some(phone))?;
        let key = self
            .store
            .active_phone()
            .map(str::to_string)
            .ok_or_else(|| CoreError::InvalidPhone(phone.to_string()))?;

        let loaded = self
            .store
            .get(&key)
            .map(|c| c.messages_loaded)
            .unwrap_or(false);
        if loaded {
            return Ok(());
        }
        self.reload_transcript(&key).await
    }

    pub fn close_conversation(&mut self) -> Result<()> {
        self.store.set_active(None)
    }

    async fn reload_transcript(&mut self, key: &str) -> Result<()> {
        match self.api.fetch_messages(key, self.message_page_size, 0).await {
            Ok(response) => {
                let messages = response.messages.iter().map(Message::from_raw).collect();
                self.store.replace_messages(key, messages)?;
                self.errors.transcript = None;
                Ok(())
            }
            Err(e) => {
                warn!(phone = %key, error = %e, "Failed to load messages");
                self.errors.transcript = Some(e.to_string());
                Err(e)
            }
        }
    }

    // ===== Actions =====

    fn next_temp_stamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_temp_stamp = now.max(self.last_temp_stamp + 1);
        self.last_temp_stamp
    }

    /// Show the message immediately, post it, then swap in the confirmed
    /// copy. On failure the pending message stays, marked failed.
    pub async fn send_message(&mut self, phone: &str, content: &str) -> Result<Message> {
        self.require(Capability::SendMessages)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::EmptyMessage);
        }
        let key = self
            .store
            .normalize(phone)
            .ok_or_else(|| CoreError::InvalidPhone(phone.to_string()))?;

        let stamp = self.next_temp_stamp();
        let optimistic = Message::optimistic(content, &self.admin_name, stamp);
        self.store.append_message(&key, optimistic.clone())?;
        self.deliver(&key, optimistic).await
    }

    /// Send a failed message again under the same temp id
    pub async fn retry_message(&mut self, phone: &str, message_id: &str) -> Result<Message> {
        self.require(Capability::SendMessages)?;
        let key = self
            .store
            .normalize(phone)
            .ok_or_else(|| CoreError::InvalidPhone(phone.to_string()))?;
        let failed = self
            .store
            .get(&key)
            .and_then(|c| c.messages.iter().find(|m| m.id == message_id))
            .filter(|m| m.status == MessageStatus::Failed)
            .cloned()
            .ok_or_else(|| CoreError::ConversationNotFound(format!("{key}/{message_id}")))?;

        self.store
            .set_message_status(&failed.id, MessageStatus::Sending);
        self.deliver(&key, failed).await
    }

    async fn deliver(&mut self, key: &str, pending: Message) -> Result<Message> {
        let request = SendMessageRequest {
            to: key.to_string(),
            message: pending.content.clone(),
            message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            client_message_id: pending.client_id.clone(),
        };

        let response = match self.api.send_message(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(phone = %key, error = %e, "Failed to send message");
                self.store.mark_failed(key, &pending.id)?;
                self.errors.send = Some(e.to_string());
                return Err(e);
            }
        };
        self.errors.send = None;

        let confirmed = match response.confirmed_message() {
            Some(raw) => {
                let mut message = Message::from_raw(&raw);
                if raw.id.is_none() && raw.message_id.is_none() {
                    if let Some(id) = &response.message_id {
                        message.id = id.clone();
                    }
                }
                message
            }
            None => match &response.message_id {
                Some(id) => Message {
                    id: id.clone(),
                    status: MessageStatus::Sent,
                    ..pending.clone()
                },
                None => {
                    // Nothing to swap in; the pending copy becomes the record
                    self.store.set_message_status(&pending.id, MessageStatus::Sent);
                    return Ok(Message {
                        status: MessageStatus::Sent,
                        ..pending
                    });
                }
            },
        };
        let confirmed = Message {
            sender: Sender::Admin,
            content: if confirmed.content.is_empty() {
                pending.content.clone()
            } else {
                confirmed.content
            },
            client_id: confirmed.client_id.or_else(|| pending.client_id.clone()),
            ..confirmed
        };

        match pending.client_id.as_deref() {
            Some(client_id) => {
                self.store
                    .reconcile_by_client_id(key, client_id, confirmed.clone())?;
            }
            None => {
                self.store
                    .reconcile_optimistic_message(key, &pending.content, confirmed.clone())?;
            }
        }
        Ok(confirmed)
    }

    /// Delete every message of a conversation on the server and locally
    pub async fn clear_chat(&mut self, phone: &str) -> Result<()> {
        self.require(Capability::ClearChats)?;
        let key = self
            .store
            .normalize(phone)
            .ok_or_else(|| CoreError::InvalidPhone(phone.to_string()))?;
        self.api.clear_conversation(&key).await?;
        if self.store.contains(&key) {
            self.store.clear_messages(&key)?;
        }
        Ok(())
    }

    pub async fn delete_conversation(&mut self, phone: &str) -> Result<()> {
        self.require(Capability::DeleteConversations)?;
        let key = self
            .store
            .normalize(phone)
            .ok_or_else(|| CoreError::InvalidPhone(phone.to_string()))?;

        let conversation_id = self
            .store
            .get(&key)
            .and_then(|c| c.conversation_id.clone());
        match conversation_id {
            Some(id) => self.api.delete_conversation_by_id(&id).await?,
            None => self.api.delete_conversation_by_phone(&key).await?,
        }

        self.store.remove(&key);
        self.pager.forget_phone(&key);
        info!(phone = %key, "Conversation deleted");
        Ok(())
    }

    pub async fn toggle_ai(&mut self, phone: &str, enabled: bool) -> Result<()> {
        self.require(Capability::ToggleAi)?;
        let key = self
            .store
            .normalize(phone)
            .ok_or_else(|| CoreError::InvalidPhone(phone.to_string()))?;
        self.api.toggle_ai(&key, enabled).await?;
        self.store.set_ai_enabled(&key, enabled)
    }

    // ===== Live updates =====

    /// Start the live event reader on its own task. Messages must be fed
    /// back through `handle_stream_message`.
    pub fn spawn_event_stream(&self) -> (mpsc::Receiver<StreamMessage>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let client = EventStreamClient::new(self.api.clone(), self.reconnect);
        let handle = tokio::spawn(client.run(tx));
        (rx, handle)
    }

    pub async fn handle_stream_message(&mut self, message: StreamMessage) -> Result<()> {
        match message {
            StreamMessage::Event(event) => {
                match dispatch(&mut self.store, &mut self.pager, event) {
                    Some(request) => self.execute(request).await,
                    None => Ok(()),
                }
            }
            StreamMessage::Connection(state) => {
                if state != self.connection {
                    debug!(state = ?state, "Live connection state changed");
                    self.connection = state.clone();
                    self.pending.push(CoreEvent::Connection { state });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LeadStatus;
    use crate::streaming::LiveEvent;
    use crate::test_support::spawn_mock;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Backend {
        list_calls: Arc<Mutex<Vec<HashMap<String, String>>>>,
        sent: Arc<Mutex<Vec<Value>>>,
    }

    fn router(backend: Backend) -> Router {
        Router::new()
            .route(
                "/api/whatsapp/conversations",
                get(
                    |State(b): State<Backend>, Query(params): Query<HashMap<String, String>>| async move {
                        b.list_calls.lock().unwrap().push(params.clone());
                        let statuses = params.get("leadStatus").cloned().unwrap_or_default();
                        if statuses.contains("ENROLLED") {
                            return (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                Json(json!({ "error": "enrolled view unavailable" })),
                            );
                        }
                        let conversations = if statuses.contains("INQUIRY") {
                            json!([{
                                "id": "conv-1",
                                "phoneNumber": "+256700123456",
                                "leadName": "Amina",
                                "leadId": "l1",
                                "leadStatus": "INQUIRY",
                                "lastMessage": "hello",
                                "messageCount": 4
                            }])
                        } else if statuses.contains("NO_LEAD") {
                            json!([{ "phoneNumber": "711000000", "contactName": "Brian" }])
                        } else {
                            json!([])
                        };
                        (
                            StatusCode::OK,
                            Json(json!({
                                "success": true,
                                "conversations": conversations,
                                "pagination": { "hasMore": false, "totalCount": 1 }
                            })),
                        )
                    },
                ),
            )
            .route(
                "/api/whatsapp/conversations/:id/messages",
                get(|Path(phone): Path<String>| async move {
                    Json(json!({
                        "success": true,
                        "messages": [
                            { "id": "m2", "content": "second", "direction": "outgoing", "timestamp": 20, "phoneNumber": phone },
                            { "id": "m1", "content": "first", "direction": "incoming", "timestamp": 10 }
                        ]
                    }))
                }),
            )
            .route(
                "/api/whatsapp/send-message",
                post(|State(b): State<Backend>, Json(body): Json<Value>| async move {
                    b.sent.lock().unwrap().push(body.clone());
                    if body["message"] == "boom" {
                        return (StatusCode::BAD_GATEWAY, Json(json!({ "error": "WhatsApp unavailable" })));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "success": true,
                            "messageId": "wamid.9",
                            "clientMessageId": body["clientMessageId"],
                        })),
                    )
                }),
            )
            .route(
                "/api/whatsapp/conversations/:id",
                delete(|| async { Json(json!({ "success": true })) }),
            )
            .route(
                "/api/whatsapp/ai/toggle-conversation",
                post(|| async { Json(json!({ "success": true })) }),
            )
            .with_state(backend)
    }

    async fn runtime(role: Option<Role>) -> (ChatRuntime, Backend) {
        let backend = Backend::default();
        let base = spawn_mock(router(backend.clone())).await;
        let config = CoreConfig {
            api_base_url: base,
            role,
            country_code: Some("256".to_string()),
            ..Default::default()
        };
        (ChatRuntime::new(&config), backend)
    }

    #[tokio::test]
    async fn test_select_tab_fills_store_and_counts() {
        let (mut rt, backend) = runtime(Some(Role::Agent)).await;
        rt.select_tab(1).await.unwrap();

        let calls = backend.list_calls.lock().unwrap().clone();
        assert_eq!(calls[0].get("leadStatus").map(String::as_str), Some("INQUIRY,CONTACTED"));
        assert_eq!(calls[0].get("limit").map(String::as_str), Some("25"));

        let conv = rt.store().get("0700123456").unwrap();
        assert_eq!(conv.display_name(), "Amina");
        assert_eq!(rt.pager().loaded_phones(1), ["700123456".to_string()]);
        assert_eq!(rt.tab_counts()[1].count, 1);

        let visible = rt.visible_conversations(SortField::default(), SortDirection::default());
        assert_eq!(visible.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_all_tabs_covers_non_leads() {
        let (mut rt, _) = runtime(Some(Role::Viewer)).await;
        let failed = rt.refresh_all_tabs().await.unwrap();

        // The enrolled tab fails server-side without blanking the others
        assert_eq!(failed, vec![5]);
        assert!(rt.pager().state(5).unwrap().error.is_some());
        assert!(rt.pager().state(1).unwrap().error.is_none());

        let counts: Vec<usize> = rt.tab_counts().iter().map(|t| t.count).collect();
        assert_eq!(counts, vec![1, 1, 0, 0, 0, 0]);
        assert_eq!(rt.pager().active_tab(), 0);
    }

    #[tokio::test]
    async fn test_select_tab_with_search_fetches_once() {
        let (mut rt, backend) = runtime(Some(Role::Agent)).await;
        rt.select_tab_with_search(1, "amina").await.unwrap();

        assert_eq!(backend.list_calls.lock().unwrap().len(), 1);
        assert_eq!(rt.pager().search(), "amina");
        let visible = rt.visible_conversations(SortField::default(), SortDirection::default());
        assert_eq!(visible.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_page_does_not_touch_store() {
        let (mut rt, _) = runtime(Some(Role::Agent)).await;
        let slow = rt.pager_mut().select_tab(1).unwrap();
        let _fast = rt.pager_mut().select_tab(0).unwrap();

        let response: ConversationsResponse = serde_json::from_value(json!({
            "success": true,
            "conversations": [{ "phoneNumber": "799999999" }]
        }))
        .unwrap();
        rt.apply_page(&slow, Ok(response)).unwrap();
        assert!(rt.store().is_empty());
    }

    #[tokio::test]
    async fn test_open_conversation_loads_sorted_transcript_once() {
        let (mut rt, _) = runtime(Some(Role::Agent)).await;
        rt.open_conversation("+256 700 123456").await.unwrap();

        let ids: Vec<&str> = rt.store().active_transcript().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(rt.store().active_phone(), Some("700123456"));
        assert!(rt.errors().transcript.is_none());
    }

    #[tokio::test]
    async fn test_send_message_reconciles_with_server_id() {
        let (mut rt, backend) = runtime(Some(Role::Agent)).await;
        let confirmed = rt.send_message("700123456", "  Karibu!  ").await.unwrap();

        assert_eq!(confirmed.id, "wamid.9");
        let messages = &rt.store().get("700123456").unwrap().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "wamid.9");
        assert_eq!(messages[0].status, MessageStatus::Sent);
        assert_eq!(messages[0].content, "Karibu!");

        let sent = backend.sent.lock().unwrap().clone();
        assert_eq!(sent[0]["to"], "700123456");
        assert_eq!(sent[0]["messageType"], "text");
        assert!(sent[0]["clientMessageId"].is_string());
    }

    #[tokio::test]
    async fn test_failed_send_stays_visible_and_can_be_retried() {
        let (mut rt, _) = runtime(Some(Role::Agent)).await;
        let err = rt.send_message("700123456", "boom").await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Transport);

        let failed = rt.store().get("700123456").unwrap().messages[0].clone();
        assert!(failed.is_optimistic());
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(rt.errors().send.as_deref(), Some("API error (502): WhatsApp unavailable"));

        let again = rt.retry_message("700123456", &failed.id).await.unwrap_err();
        assert!(matches!(again, CoreError::Api { status: 502, .. }));
        let messages = &rt.store().get("700123456").unwrap().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn test_temp_ids_are_unique_for_rapid_sends() {
        let (mut rt, _) = runtime(Some(Role::Agent)).await;
        let a = rt.next_temp_stamp();
        let b = rt.next_temp_stamp();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_mutations_require_permission() {
        let (mut rt, backend) = runtime(None).await;
        let err = rt.send_message("700123456", "hi").await.unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied(Capability::SendMessages)));
        assert!(rt.store().is_empty(), "nothing optimistic when not permitted");
        assert!(backend.sent.lock().unwrap().is_empty());

        let (mut agent, _) = runtime(Some(Role::Agent)).await;
        let err = agent.delete_conversation("700123456").await.unwrap_err();
        assert_eq!(err.to_string(), "Not permitted: delete_conversations");
    }

    #[tokio::test]
    async fn test_delete_and_toggle_ai() {
        let (mut rt, _) = runtime(Some(Role::Admin)).await;
        rt.select_tab(1).await.unwrap();
        rt.open_conversation("700123456").await.unwrap();

        rt.toggle_ai("700123456", false).await.unwrap();
        assert!(!rt.store().get("700123456").unwrap().ai_enabled);

        rt.delete_conversation("700123456").await.unwrap();
        assert!(rt.store().get("700123456").is_none());
        assert!(rt.store().active_phone().is_none());
        assert!(rt.pager().loaded_phones(1).is_empty());
    }

    #[tokio::test]
    async fn test_lead_status_event_refetches_active_tab() {
        let (mut rt, backend) = runtime(Some(Role::Agent)).await;
        rt.select_tab(1).await.unwrap();

        rt.handle_stream_message(StreamMessage::Event(LiveEvent::LeadStatusUpdate {
            phone: "700123456".to_string(),
            lead_status: Some(LeadStatus::Applied),
            lead_id: None,
        }))
        .await
        .unwrap();

        assert_eq!(backend.list_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_connection_changes_are_published_once() {
        let (mut rt, _) = runtime(Some(Role::Agent)).await;
        rt.handle_stream_message(StreamMessage::Connection(ConnectionState::Connected))
            .await
            .unwrap();
        rt.handle_stream_message(StreamMessage::Connection(ConnectionState::Connected))
            .await
            .unwrap();

        let changes = rt.drain_changes();
        assert_eq!(
            changes,
            vec![CoreEvent::Connection {
                state: ConnectionState::Connected
            }]
        );
        assert_eq!(rt.connection(), &ConnectionState::Connected);
    }
}
