// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend that reaches the support service through the Chatdesk relay.
//!
//! The relay holds the credentials; this client only names the action and
//! its parameters.

use std::time::Duration;

use async_trait::async_trait;
use chatdesk_core::traits::SupportBackend;
use chatdesk_core::types::{AttachmentUpload, ContactIdentity, ConversationId, Message};
use chatdesk_core::ChatdeskError;
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::http::{build_http_client, decode, file_part, send_error};
use crate::types::{
    RelayAction, RelayPayload, RelayRequest, UploadEnvelope, WireContact, WireConversation,
    WireId, WireMessage,
};

/// Backend posting actions to `{relay}/api/chatwoot` and files to
/// `{relay}/api/upload`.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    relay_url: String,
    inbox_identifier: String,
}

impl RelayClient {
    pub fn new(
        relay_url: &str,
        inbox_identifier: &str,
        timeout: Duration,
    ) -> Result<Self, ChatdeskError> {
        if inbox_identifier.trim().is_empty() {
            return Err(ChatdeskError::Config(
                "upstream.inbox_identifier is required".into(),
            ));
        }
        Ok(Self {
            client: build_http_client(timeout)?,
            relay_url: relay_url.trim_end_matches('/').to_string(),
            inbox_identifier: inbox_identifier.to_string(),
        })
    }

    fn payload(&self) -> RelayPayload {
        RelayPayload {
            inbox_identifier: Some(self.inbox_identifier.clone()),
            ..RelayPayload::default()
        }
    }

    fn scoped_payload(
        &self,
        contact: &ContactIdentity,
        conversation: Option<&ConversationId>,
    ) -> RelayPayload {
        RelayPayload {
            contact_identifier: Some(contact.identifier.clone()),
            conversation_id: conversation.map(|c| WireId::from(c.0.as_str())),
            ..self.payload()
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: RelayAction,
        payload: RelayPayload,
    ) -> Result<T, ChatdeskError> {
        debug!(%action, "relay action");
        let response = self
            .client
            .post(format!("{}/api/chatwoot", self.relay_url))
            .json(&RelayRequest::new(action, payload))
            .send()
            .await
            .map_err(send_error)?;
        decode(response).await
    }
}

#[async_trait]
impl SupportBackend for RelayClient {
    async fn create_contact(&self, name: &str) -> Result<ContactIdentity, ChatdeskError> {
        let payload = RelayPayload {
            name: Some(name.to_string()),
            ..self.payload()
        };
        let contact: WireContact = self.call(RelayAction::CreateContact, payload).await?;
        Ok(contact.into())
    }

    async fn create_conversation(
        &self,
        contact: &ContactIdentity,
    ) -> Result<ConversationId, ChatdeskError> {
        let conversation: WireConversation = self
            .call(
                RelayAction::CreateConversation,
                self.scoped_payload(contact, None),
            )
            .await?;
        Ok(ConversationId(conversation.id.to_string()))
    }

    async fn send_message(
        &self,
        contact: &ContactIdentity,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<Message, ChatdeskError> {
        let payload = RelayPayload {
            content: Some(content.to_string()),
            ..self.scoped_payload(contact, Some(conversation))
        };
        let message: WireMessage = self.call(RelayAction::SendMessage, payload).await?;
        Ok(message.into_message())
    }

    async fn list_messages(
        &self,
        contact: &ContactIdentity,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, ChatdeskError> {
        let messages: Vec<WireMessage> = self
            .call(
                RelayAction::ListMessages,
                self.scoped_payload(contact, Some(conversation)),
            )
            .await?;
        Ok(messages.into_iter().map(WireMessage::into_message).collect())
    }

    async fn upload_attachment(
        &self,
        _contact: &ContactIdentity,
        conversation: &ConversationId,
        upload: AttachmentUpload,
    ) -> Result<Message, ChatdeskError> {
        let mut form = Form::new()
            .part("attachment", file_part(&upload)?)
            .text("conversationId", conversation.0.clone());
        if let Some(caption) = upload.caption.clone() {
            form = form.text("content", caption);
        }
        debug!(file = %upload.file_name, size = upload.data.len(), "relay upload");
        let response = self
            .client
            .post(format!("{}/api/upload", self.relay_url))
            .multipart(form)
            .send()
            .await
            .map_err(send_error)?;
        let envelope: UploadEnvelope = decode(response).await?;
        match envelope {
            UploadEnvelope {
                success: true,
                data: Some(message),
                ..
            } => Ok(message.into_message()),
            UploadEnvelope { error, .. } => Err(ChatdeskError::Internal(
                error.unwrap_or_else(|| "relay upload returned no message".into()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn contact() -> ContactIdentity {
        ContactIdentity {
            identifier: "src-1".into(),
            pubsub_token: "tok".into(),
        }
    }

    fn client(server: &MockServer) -> RelayClient {
        RelayClient::new(&format!("{}/", server.uri()), "inbox-1", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn create_contact_sends_action_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatwoot"))
            .and(body_partial_json(json!({
                "action": "create_contact",
                "payload": { "inboxIdentifier": "inbox-1", "name": "Visitor 3" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "source_id": "src-1", "pubsub_token": "tok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = client(&server).create_contact("Visitor 3").await.unwrap();
        assert_eq!(identity, contact());
    }

    #[tokio::test]
    async fn send_message_carries_scope_and_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatwoot"))
            .and(body_partial_json(json!({
                "action": "send_message",
                "payload": {
                    "contactIdentifier": "src-1",
                    "conversationId": "5",
                    "content": "hello"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 8, "content": "hello", "message_type": 0, "created_at": 100
            })))
            .mount(&server)
            .await;

        let message = client(&server)
            .send_message(&contact(), &ConversationId("5".into()), "hello")
            .await
            .unwrap();
        assert_eq!(message.id.0, "8");
        assert!(message.is_outgoing());
    }

    #[tokio::test]
    async fn relay_error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatwoot"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "error": "missing token" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .list_messages(&contact(), &ConversationId("5".into()))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn upload_unwraps_success_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "id": 31, "content": "", "message_type": "incoming", "created_at": 31,
                    "attachments": [{ "file_type": "file", "data_url": "https://cdn/doc.pdf" }]
                }
            })))
            .mount(&server)
            .await;

        let upload = AttachmentUpload {
            file_name: "doc.pdf".into(),
            mime_type: "application/pdf".into(),
            data: b"%PDF".to_vec(),
            caption: None,
        };
        let message = client(&server)
            .upload_attachment(&contact(), &ConversationId("5".into()), upload)
            .await
            .unwrap();
        assert_eq!(message.id.0, "31");
        assert!(message.is_outgoing());

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"attachment\""));
        assert!(body.contains("name=\"conversationId\""));
        assert!(!body.contains("name=\"content\""));
    }

    #[tokio::test]
    async fn upload_without_message_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
            .mount(&server)
            .await;

        let upload = AttachmentUpload {
            file_name: "a.txt".into(),
            mime_type: "text/plain".into(),
            data: b"a".to_vec(),
            caption: None,
        };
        let err = client(&server)
            .upload_attachment(&contact(), &ConversationId("5".into()), upload)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatdeskError::Internal(_)));
    }
}
