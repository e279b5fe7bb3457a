// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the relay API.
//!
//! Handles POST /api/chatwoot, POST /api/proxy and GET /health. Upstream
//! answers are returned unchanged: same status, same body bytes, same
//! content type.

use std::str::FromStr;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chatdesk_chatwoot::{InboxPaths, ProxyRequest, RelayAction, RelayPayload, RelayRequest};
use chatdesk_core::ChatdeskError;
use reqwest::{Method, Url};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::server::RelayState;

/// Header carrying the account token upstream.
pub const ACCESS_TOKEN_HEADER: &str = "api_access_token";

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
    /// Seconds since the relay started.
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// A failure answered with `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ChatdeskError> for ApiError {
    fn from(err: ChatdeskError) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Answer for any method other than POST on the API routes.
pub async fn method_not_allowed() -> Response {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
}

/// GET /health
pub async fn get_health(State(state): State<RelayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// One upstream call derived from a relay action.
#[derive(Debug, PartialEq)]
pub struct UpstreamCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ChatdeskError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ChatdeskError::InvalidRequest(format!("payload.{field} is required")))
}

/// Maps an action and its payload to the public client API call.
pub fn upstream_call(
    base_url: &str,
    action: RelayAction,
    payload: &RelayPayload,
) -> Result<UpstreamCall, ChatdeskError> {
    let paths = InboxPaths::new(base_url, required(&payload.inbox_identifier, "inboxIdentifier")?);
    let conversation = || {
        payload
            .conversation_id
            .as_ref()
            .map(ToString::to_string)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ChatdeskError::InvalidRequest("payload.conversationId is required".into()))
    };

    let call = match action {
        RelayAction::CreateContact => UpstreamCall {
            method: Method::POST,
            url: paths.contacts(),
            body: Some(match &payload.name {
                Some(name) => json!({ "name": name }),
                None => json!({}),
            }),
        },
        RelayAction::CreateConversation => UpstreamCall {
            method: Method::POST,
            url: paths.conversations(required(&payload.contact_identifier, "contactIdentifier")?),
            body: Some(json!({})),
        },
        RelayAction::SendMessage => {
            let contact = required(&payload.contact_identifier, "contactIdentifier")?;
            let conversation = conversation()?;
            let content = required(&payload.content, "content")?;
            UpstreamCall {
                method: Method::POST,
                url: paths.messages(contact, &conversation),
                body: Some(json!({ "content": content })),
            }
        }
        RelayAction::ListMessages => {
            let contact = required(&payload.contact_identifier, "contactIdentifier")?;
            UpstreamCall {
                method: Method::GET,
                url: paths.messages(contact, &conversation()?),
                body: None,
            }
        }
    };
    Ok(call)
}

/// POST /api/chatwoot
///
/// Runs a named action against the public client API with the account
/// token attached.
pub async fn post_chatwoot(
    State(state): State<RelayState>,
    body: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let token = state.config.api_access_token.as_ref().ok_or_else(|| {
        ChatdeskError::Config("relay api_access_token is not configured".into())
    })?;
    let Json(request) = body?;
    let action = RelayAction::from_str(&request.action).map_err(|_| {
        ChatdeskError::InvalidRequest(format!("unknown action '{}'", request.action))
    })?;
    let call = upstream_call(&state.config.base_url, action, &request.payload)?;
    debug!(%action, url = %call.url, "relaying action");

    let mut builder = state
        .http
        .request(call.method, &call.url)
        .header(ACCESS_TOKEN_HEADER, token.expose_secret());
    if let Some(body) = &call.body {
        builder = builder.json(body);
    }
    let response = builder.send().await.map_err(|e| {
        warn!(error = %e, %action, "upstream action failed");
        ChatdeskError::transport("upstream request failed", e)
    })?;
    forward(response).await
}

/// True when `destination` has the same host and port as `base_url`.
pub fn is_upstream_host(destination: &Url, base_url: &str) -> bool {
    match Url::parse(base_url) {
        Ok(base) => {
            base.host_str() == destination.host_str()
                && base.port_or_known_default() == destination.port_or_known_default()
        }
        Err(_) => false,
    }
}

/// POST /api/proxy
///
/// Forwards a JSON body to the given URL without credentials.
pub async fn post_proxy(
    State(state): State<RelayState>,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let url = request
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ChatdeskError::InvalidRequest("destination url is required".into()))?;
    let destination = Url::parse(&url)
        .map_err(|e| ChatdeskError::InvalidRequest(format!("invalid destination url: {e}")))?;
    if !state.config.allow_any_proxy_host && !is_upstream_host(&destination, &state.config.base_url)
    {
        return Err(ChatdeskError::InvalidRequest(format!(
            "destination host {} is not allowed",
            destination.host_str().unwrap_or_default()
        ))
        .into());
    }
    debug!(url = %destination, "proxying request");

    let mut builder = state.http.post(destination);
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }
    let response = builder.send().await.map_err(|e| {
        warn!(error = %e, "proxy request failed");
        ChatdeskError::transport("proxy request failed", e)
    })?;
    forward(response).await
}

/// Copies status, content type and body bytes from an upstream response.
pub async fn forward(response: reqwest::Response) -> Result<Response, ApiError> {
    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ChatdeskError::transport("failed to read upstream body", e))?;

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(bytes))
        .map_err(|e| ChatdeskError::Internal(format!("failed to build response: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_chatwoot::types::WireId;

    fn payload() -> RelayPayload {
        RelayPayload {
            inbox_identifier: Some("inbox".into()),
            contact_identifier: Some("c1".into()),
            conversation_id: Some(WireId::Num(9)),
            content: Some("hello".into()),
            name: None,
        }
    }

    #[test]
    fn list_messages_is_a_get() {
        let call = upstream_call("https://chat.test", RelayAction::ListMessages, &payload()).unwrap();
        assert_eq!(call.method, Method::GET);
        assert_eq!(
            call.url,
            "https://chat.test/public/api/v1/inboxes/inbox/contacts/c1/conversations/9/messages"
        );
        assert!(call.body.is_none());
    }

    #[test]
    fn send_message_carries_content() {
        let call = upstream_call("https://chat.test", RelayAction::SendMessage, &payload()).unwrap();
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.body, Some(json!({ "content": "hello" })));
    }

    #[test]
    fn missing_fields_are_invalid_requests() {
        let mut missing_contact = payload();
        missing_contact.contact_identifier = None;
        let err = upstream_call("https://chat.test", RelayAction::CreateConversation, &missing_contact)
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
        assert!(err.to_string().contains("contactIdentifier"));

        let mut missing_conversation = payload();
        missing_conversation.conversation_id = None;
        let err = upstream_call("https://chat.test", RelayAction::SendMessage, &missing_conversation)
            .unwrap_err();
        assert!(err.to_string().contains("conversationId"));

        let err = upstream_call("https://chat.test", RelayAction::CreateContact, &RelayPayload::default())
            .unwrap_err();
        assert!(err.to_string().contains("inboxIdentifier"));
    }

    #[test]
    fn upstream_host_check_compares_host_and_port() {
        let base = "https://app.chatwoot.com";
        let same = Url::parse("https://app.chatwoot.com:443/public/api/v1/x").unwrap();
        let other = Url::parse("https://evil.example/steal").unwrap();
        let other_port = Url::parse("https://app.chatwoot.com:8443/x").unwrap();
        assert!(is_upstream_host(&same, base));
        assert!(!is_upstream_host(&other, base));
        assert!(!is_upstream_host(&other_port, base));
    }

    #[test]
    fn api_error_uses_error_status() {
        let err: ApiError = ChatdeskError::PayloadTooLarge { size: 20, limit: 10 }.into();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let err: ApiError = ChatdeskError::Upstream {
            status: 422,
            body: String::new(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
