// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network collaborator for the upstream support service.

use async_trait::async_trait;

use crate::error::ChatdeskError;
use crate::types::{AttachmentUpload, ContactIdentity, ConversationId, Message};

/// Upstream support service, reached directly or through the relay.
///
/// Implementations normalize every response into canonical types before
/// returning it.
#[async_trait]
pub trait SupportBackend: Send + Sync {
    /// Creates a visitor contact with the given display name.
    async fn create_contact(&self, name: &str) -> Result<ContactIdentity, ChatdeskError>;

    /// Creates a conversation owned by `contact`.
    async fn create_conversation(
        &self,
        contact: &ContactIdentity,
    ) -> Result<ConversationId, ChatdeskError>;

    /// Posts a text message and returns the server's copy.
    async fn send_message(
        &self,
        contact: &ContactIdentity,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<Message, ChatdeskError>;

    /// Fetches every message of the conversation, in any order.
    async fn list_messages(
        &self,
        contact: &ContactIdentity,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, ChatdeskError>;

    /// Uploads one attachment (with optional caption) as a new message.
    async fn upload_attachment(
        &self,
        contact: &ContactIdentity,
        conversation: &ConversationId,
        upload: AttachmentUpload,
    ) -> Result<Message, ChatdeskError>;
}
