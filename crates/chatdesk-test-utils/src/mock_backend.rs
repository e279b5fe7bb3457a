// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock support backend for deterministic testing.
//!
//! `MockBackend` implements `SupportBackend` over an in-memory conversation
//! store. Every call is counted, failures can be queued per operation and
//! deliveries (sends and uploads) can be held until released.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::{watch, Mutex};

use chatdesk_core::traits::SupportBackend;
use chatdesk_core::types::{
    Attachment, AttachmentUpload, ContactIdentity, ConversationId, FileType, Message, MessageId,
    MessageStatus, Sender,
};
use chatdesk_core::ChatdeskError;

/// First timestamp handed out, in epoch seconds.
const CLOCK_START: i64 = 1_700_000_000;

/// Backend operations, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    CreateContact,
    CreateConversation,
    SendMessage,
    ListMessages,
    UploadAttachment,
}

/// How often each operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create_contact: usize,
    pub create_conversation: usize,
    pub send_message: usize,
    pub list_messages: usize,
    pub upload_attachment: usize,
}

#[derive(Default)]
struct BackendState {
    calls: CallCounts,
    failures: HashMap<BackendOp, VecDeque<(u16, String)>>,
    conversations: HashMap<String, Vec<Message>>,
    contact_names: Vec<String>,
    next_id: u64,
    clock: i64,
}

impl BackendState {
    fn record(&mut self, op: BackendOp) -> Result<(), ChatdeskError> {
        let counter = match op {
            BackendOp::CreateContact => &mut self.calls.create_contact,
            BackendOp::CreateConversation => &mut self.calls.create_conversation,
            BackendOp::SendMessage => &mut self.calls.send_message,
            BackendOp::ListMessages => &mut self.calls.list_messages,
            BackendOp::UploadAttachment => &mut self.calls.upload_attachment,
        };
        *counter += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some((status, body)) => Err(ChatdeskError::Upstream { status, body }),
            None => Ok(()),
        }
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn tick(&mut self) -> Option<chrono::DateTime<Utc>> {
        self.clock += 1;
        Utc.timestamp_opt(CLOCK_START + self.clock, 0).single()
    }

    fn conversation(&mut self, id: &ConversationId) -> Result<&mut Vec<Message>, ChatdeskError> {
        self.conversations
            .get_mut(&id.0)
            .ok_or_else(|| ChatdeskError::Upstream {
                status: 404,
                body: format!("{{\"error\":\"conversation {id} not found\"}}"),
            })
    }
}

/// An in-memory support service.
pub struct MockBackend {
    state: Arc<Mutex<BackendState>>,
    gate: watch::Sender<bool>,
}

impl MockBackend {
    /// Create a backend with no conversations and an open gate.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(BackendState::default())),
            gate,
        }
    }

    /// Counts of every call so far.
    pub async fn calls(&self) -> CallCounts {
        self.state.lock().await.calls
    }

    /// Display names passed to `create_contact`.
    pub async fn contact_names(&self) -> Vec<String> {
        self.state.lock().await.contact_names.clone()
    }

    /// Makes the next call of `op` fail with an upstream status.
    pub async fn fail_next(&self, op: BackendOp, status: u16) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back((status, format!("{{\"error\":\"injected {status}\"}}")));
    }

    /// Creates a conversation directly, as if made in an earlier session.
    pub async fn seed_conversation(&self, id: &str, messages: Vec<Message>) {
        self.state
            .lock()
            .await
            .conversations
            .insert(id.to_string(), messages);
    }

    /// Posts an agent message into a conversation and returns it.
    pub async fn push_agent_reply(&self, conversation: &str, content: &str) -> Message {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let created_at = state.tick();
        let message = Message::text(id, content, Sender::agent(Some("Agent".into())), created_at);
        state
            .conversations
            .entry(conversation.to_string())
            .or_default()
            .push(message.clone());
        message
    }

    /// Messages stored for a conversation.
    pub async fn stored_messages(&self, conversation: &str) -> Vec<Message> {
        self.state
            .lock()
            .await
            .conversations
            .get(conversation)
            .cloned()
            .unwrap_or_default()
    }

    /// Holds sends and uploads until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Lets held and future deliveries through.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    async fn pass_gate(&self) {
        let mut open = self.gate.subscribe();
        // The sender lives as long as `self`, so this only fails on teardown.
        let _ = open.wait_for(|open| *open).await;
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SupportBackend for MockBackend {
    async fn create_contact(&self, name: &str) -> Result<ContactIdentity, ChatdeskError> {
        let mut state = self.state.lock().await;
        state.record(BackendOp::CreateContact)?;
        state.contact_names.push(name.to_string());
        let n = state.next_id();
        Ok(ContactIdentity {
            identifier: format!("contact-{n}"),
            pubsub_token: format!("pubsub-{n}"),
        })
    }

    async fn create_conversation(
        &self,
        _contact: &ContactIdentity,
    ) -> Result<ConversationId, ChatdeskError> {
        let mut state = self.state.lock().await;
        state.record(BackendOp::CreateConversation)?;
        let id = state.next_id();
        state.conversations.insert(id.clone(), Vec::new());
        Ok(ConversationId(id))
    }

    async fn send_message(
        &self,
        _contact: &ContactIdentity,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<Message, ChatdeskError> {
        self.pass_gate().await;
        let mut state = self.state.lock().await;
        state.record(BackendOp::SendMessage)?;
        let id = state.next_id();
        let created_at = state.tick();
        let message = Message::text(id, content, Sender::contact(), created_at);
        state.conversation(conversation)?.push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        _contact: &ContactIdentity,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, ChatdeskError> {
        let mut state = self.state.lock().await;
        state.record(BackendOp::ListMessages)?;
        Ok(state.conversation(conversation)?.clone())
    }

    async fn upload_attachment(
        &self,
        _contact: &ContactIdentity,
        conversation: &ConversationId,
        upload: AttachmentUpload,
    ) -> Result<Message, ChatdeskError> {
        self.pass_gate().await;
        let mut state = self.state.lock().await;
        state.record(BackendOp::UploadAttachment)?;
        let id = state.next_id();
        let created_at = state.tick();
        let message = Message {
            id: MessageId(id),
            content: upload.caption.unwrap_or_default(),
            sender: Sender::contact(),
            created_at,
            attachments: vec![Attachment {
                file_type: FileType::from_mime(&upload.mime_type),
                data_url: format!("https://files.test/{}", upload.file_name),
                file_name: upload.file_name,
            }],
            status: MessageStatus::Confirmed,
        };
        state.conversation(conversation)?.push(message.clone());
        Ok(message)
    }
}
