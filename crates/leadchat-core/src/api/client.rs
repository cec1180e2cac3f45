use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{
    AckResponse, ConversationListQuery, ConversationsResponse, MessagesResponse,
    SendMessageRequest, SendMessageResponse, ToggleAiRequest,
};
use crate::config::CoreConfig;
use crate::constants::paths;
use crate::error::{CoreError, Result};

/// Client for the WhatsApp conversation endpoints
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(&config.api_base_url, config.api_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetch one page of conversations
    pub async fn list_conversations(
        &self,
        query: &ConversationListQuery,
    ) -> Result<ConversationsResponse> {
        let request = self
            .client
            .get(self.url(paths::CONVERSATIONS))
            .query(&query.to_params());
        let response: ConversationsResponse = self.send_json(request).await?;
        ensure_success(response.success, response.error.as_deref(), "Failed to load conversations")?;
        Ok(response)
    }

    /// Fetch the transcript of one conversation
    pub async fn fetch_messages(
        &self,
        phone: &str,
        limit: u32,
        offset: u32,
    ) -> Result<MessagesResponse> {
        let url = self.url(&format!("{}/{}/messages", paths::CONVERSATIONS, phone));
        let request = self.client.get(url).query(&[
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        let response: MessagesResponse = self.send_json(request).await?;
        ensure_success(response.success, response.error.as_deref(), "Failed to load messages")?;
        Ok(response)
    }

    pub async fn send_message(&self, body: &SendMessageRequest) -> Result<SendMessageResponse> {
        let request = self.client.post(self.url(paths::SEND_MESSAGE)).json(body);
        let response: SendMessageResponse = self.send_json(request).await?;
        ensure_success(response.success, response.error.as_deref(), "Failed to send message")?;
        Ok(response)
    }

    /// Delete every message of a conversation but keep the conversation
    pub async fn clear_conversation(&self, phone: &str) -> Result<()> {
        let url = self.url(&format!("{}/phone/{}/clear", paths::CONVERSATIONS, phone));
        self.send_ack(self.client.patch(url), "Failed to clear conversation")
            .await
    }

    pub async fn delete_conversation_by_id(&self, conversation_id: &str) -> Result<()> {
        let url = self.url(&format!("{}/{}", paths::CONVERSATIONS, conversation_id));
        self.send_ack(self.client.delete(url), "Failed to delete conversation")
            .await
    }

    pub async fn delete_conversation_by_phone(&self, phone: &str) -> Result<()> {
        let url = self.url(&format!("{}/phone/{}", paths::CONVERSATIONS, phone));
        self.send_ack(self.client.delete(url), "Failed to delete conversation")
            .await
    }

    pub async fn toggle_ai(&self, phone: &str, enabled: bool) -> Result<()> {
        let body = ToggleAiRequest {
            phone_number: phone.to_string(),
            enabled,
        };
        let request = self.client.post(self.url(paths::TOGGLE_AI)).json(&body);
        self.send_ack(request, "Failed to toggle AI").await
    }

    /// Open the server-sent event stream. The caller reads the body.
    pub async fn open_event_stream(&self) -> Result<Response> {
        let request = self
            .client
            .get(self.url(paths::MESSAGE_STREAM))
            .header(reqwest::header::ACCEPT, "text/event-stream");
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = error_message(&error_text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            warn!(status = status.as_u16(), %message, "API request failed");
            return Err(CoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_ack(&self, request: RequestBuilder, fallback: &str) -> Result<()> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        // Some mutations answer 204 with no body
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        let ack: AckResponse = serde_json::from_slice(&bytes)?;
        debug!(success = ack.success, "Mutation acknowledged");
        ensure_success(ack.success, ack.error.as_deref(), fallback)
    }
}

fn ensure_success(success: bool, error: Option<&str>, fallback: &str) -> Result<()> {
    if success {
        return Ok(());
    }
    Err(CoreError::Api {
        status: 200,
        message: error.unwrap_or(fallback).to_string(),
    })
}

/// Pull a readable message out of an error body: `{ error }`, `{ message }`
/// or the raw text
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ["error", "message"]
            .iter()
            .find_map(|k| value.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::test_support::spawn_mock;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get, patch, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_list_conversations_sends_filters_and_token() {
        let app = Router::new().route(
            "/api/whatsapp/conversations",
            get(
                |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    Json(json!({
                        "success": true,
                        "conversations": [{
                            "phoneNumber": "256700123456",
                            "contactName": auth,
                            "leadStatus": params.get("leadStatus").cloned().unwrap_or_default(),
                        }],
                        "pagination": {
                            "hasMore": params.get("offset").map(|o| o == "0").unwrap_or(false),
                            "totalCount": 1
                        }
                    }))
                },
            ),
        );
        let base = spawn_mock(app).await;
        let client = ApiClient::new(&base, Some("tok".to_string()));

        let response = client
            .list_conversations(&ConversationListQuery {
                limit: 25,
                offset: 0,
                lead_statuses: vec!["INQUIRY".to_string(), "CONTACTED".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        let conv = &response.conversations[0];
        assert_eq!(conv.contact_name.as_deref(), Some("Bearer tok"));
        assert_eq!(
            conv.lead_status.as_ref().map(|s| s.to_string()),
            Some("INQUIRY,CONTACTED".to_string())
        );
        assert!(response.pagination.has_more);
    }

    #[tokio::test]
    async fn test_fetch_messages_by_phone() {
        let app = Router::new().route(
            "/api/whatsapp/conversations/:phone/messages",
            get(|Path(phone): Path<String>| async move {
                Json(json!({
                    "success": true,
                    "messages": [{ "id": "m1", "content": "hi", "phoneNumber": phone }]
                }))
            }),
        );
        let base = spawn_mock(app).await;
        let client = ApiClient::new(&base, None);

        let response = client.fetch_messages("700123456", 100, 0).await.unwrap();
        assert_eq!(response.messages.len(), 1);
        assert_eq!(response.messages[0].phone_number.as_deref(), Some("700123456"));
    }

    #[tokio::test]
    async fn test_http_error_maps_to_api_error() {
        let app = Router::new().route(
            "/api/whatsapp/send-message",
            post(|| async { (StatusCode::FORBIDDEN, Json(json!({ "error": "Insufficient role" }))) }),
        );
        let base = spawn_mock(app).await;
        let client = ApiClient::new(&base, None);

        let err = client
            .send_message(&SendMessageRequest {
                to: "700123456".to_string(),
                message: "hi".to_string(),
                message_type: "text".to_string(),
                client_message_id: None,
            })
            .await
            .unwrap_err();

        match &err {
            CoreError::Api { status, message } => {
                assert_eq!(*status, 403);
                assert_eq!(message, "Insufficient role");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.category(), ErrorCategory::Permission);
    }

    #[tokio::test]
    async fn test_unsuccessful_body_is_an_error() {
        let app = Router::new().route(
            "/api/whatsapp/conversations/phone/:phone/clear",
            patch(|| async { Json(json!({ "success": false, "error": "No such chat" })) }),
        );
        let base = spawn_mock(app).await;
        let client = ApiClient::new(&base, None);

        let err = client.clear_conversation("700123456").await.unwrap_err();
        assert!(matches!(err, CoreError::Api { ref message, .. } if message == "No such chat"));
    }

    #[tokio::test]
    async fn test_mutations_accept_empty_and_ack_bodies() {
        let app = Router::new()
            .route(
                "/api/whatsapp/conversations/:id",
                delete(|| async { StatusCode::NO_CONTENT }),
            )
            .route(
                "/api/whatsapp/conversations/phone/:phone",
                delete(|| async { Json(json!({ "success": true, "message": "deleted" })) }),
            )
            .route(
                "/api/whatsapp/ai/toggle-conversation",
                post(|Json(body): Json<serde_json::Value>| async move {
                    let ok = body["phoneNumber"] == "700123456" && body["enabled"] == false;
                    Json(json!({ "success": ok }))
                }),
            );
        let base = spawn_mock(app).await;
        let client = ApiClient::new(&base, None);

        client.delete_conversation_by_id("conv-1").await.unwrap();
        client.delete_conversation_by_phone("700123456").await.unwrap();
        client.toggle_ai("700123456", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_error_when_server_is_down() {
        let client = ApiClient::new("http://127.0.0.1:1", None);
        let err = client
            .list_conversations(&ConversationListQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Transport);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message(r#"{"message":"bad"}"#).as_deref(), Some("bad"));
        assert_eq!(error_message("Bad Gateway").as_deref(), Some("Bad Gateway"));
        assert_eq!(error_message("  "), None);
    }
}
