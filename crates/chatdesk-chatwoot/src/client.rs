// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct client for the Chatwoot public client API.
//!
//! The public API needs no credentials: the inbox identifier and the contact
//! identifier scope every request.

use std::time::Duration;

use async_trait::async_trait;
use chatdesk_core::traits::SupportBackend;
use chatdesk_core::types::{AttachmentUpload, ContactIdentity, ConversationId, Message};
use chatdesk_core::ChatdeskError;
use reqwest::multipart::Form;
use serde_json::json;
use tracing::debug;

use crate::http::{build_http_client, decode, file_part, send_error};
use crate::types::{InboxPaths, WireContact, WireConversation, WireMessage};

/// Backend talking straight to `/public/api/v1/inboxes/{inbox}`.
#[derive(Debug, Clone)]
pub struct PublicApiClient {
    client: reqwest::Client,
    paths: InboxPaths,
    inbox_identifier: String,
}

impl PublicApiClient {
    /// Creates a client for one inbox of the service at `base_url`.
    pub fn new(
        base_url: &str,
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
            paths: InboxPaths::new(base_url, inbox_identifier),
            inbox_identifier: inbox_identifier.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.paths = InboxPaths::new(url, &self.inbox_identifier);
        self
    }
}

#[async_trait]
impl SupportBackend for PublicApiClient {
    async fn create_contact(&self, name: &str) -> Result<ContactIdentity, ChatdeskError> {
        let response = self
            .client
            .post(self.paths.contacts())
            .json(&json!({ "name": name }))
            .send()
            .await
            .map_err(send_error)?;
        let contact: WireContact = decode(response).await?;
        debug!(contact = %contact.source_id, "contact created");
        Ok(contact.into())
    }

    async fn create_conversation(
        &self,
        contact: &ContactIdentity,
    ) -> Result<ConversationId, ChatdeskError> {
        let response = self
            .client
            .post(self.paths.conversations(&contact.identifier))
            .json(&json!({}))
            .send()
            .await
            .map_err(send_error)?;
        let conversation: WireConversation = decode(response).await?;
        debug!(conversation = %conversation.id, "conversation created");
        Ok(ConversationId(conversation.id.to_string()))
    }

    async fn send_message(
        &self,
        contact: &ContactIdentity,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<Message, ChatdeskError> {
        let response = self
            .client
            .post(self.paths.messages(&contact.identifier, &conversation.0))
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(send_error)?;
        let message: WireMessage = decode(response).await?;
        Ok(message.into_message())
    }

    async fn list_messages(
        &self,
        contact: &ContactIdentity,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, ChatdeskError> {
        let response = self
            .client
            .get(self.paths.messages(&contact.identifier, &conversation.0))
            .send()
            .await
            .map_err(send_error)?;
        let messages: Vec<WireMessage> = decode(response).await?;
        Ok(messages.into_iter().map(WireMessage::into_message).collect())
    }

    async fn upload_attachment(
        &self,
        contact: &ContactIdentity,
        conversation: &ConversationId,
        upload: AttachmentUpload,
    ) -> Result<Message, ChatdeskError> {
        let mut form = Form::new().part("attachments[]", file_part(&upload)?);
        if let Some(caption) = upload.caption.clone() {
            form = form.text("content", caption);
        }
        let response = self
            .client
            .post(self.paths.messages(&contact.identifier, &conversation.0))
            .multipart(form)
            .send()
            .await
            .map_err(send_error)?;
        let message: WireMessage = decode(response).await?;
        Ok(message.into_message())
    }
}
