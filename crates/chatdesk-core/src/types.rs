// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical conversation types.
//!
//! Every upstream payload shape is normalized into these types at the network
//! boundary; nothing past that boundary sees raw JSON.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Prefix of locally generated placeholder ids.
pub const PLACEHOLDER_PREFIX: &str = "temp_";

/// Identifier of a message: a server id, or a local placeholder id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generates a fresh placeholder id for an optimistic message.
    pub fn placeholder() -> Self {
        MessageId(format!("{PLACEHOLDER_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Whether this id was generated locally and is not known upstream.
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the single conversation owned by the current contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visitor identity issued by the upstream service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactIdentity {
    /// Opaque contact identifier (`source_id` upstream).
    pub identifier: String,
    /// Token authorizing the realtime subscription.
    pub pubsub_token: String,
}

/// Who authored a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    /// The visitor using this widget. Rendered as outgoing.
    Contact,
    /// An agent, bot or system sender. Rendered as incoming.
    Agent,
}

/// Message author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub kind: SenderKind,
    pub name: Option<String>,
}

impl Sender {
    /// The visitor.
    pub fn contact() -> Self {
        Sender {
            kind: SenderKind::Contact,
            name: None,
        }
    }

    /// An agent, optionally named.
    pub fn agent(name: Option<String>) -> Self {
        Sender {
            kind: SenderKind::Agent,
            name,
        }
    }
}

/// Attachment category; images get an inline treatment, everything else a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Image,
    File,
}

impl FileType {
    /// Classifies an upstream `file_type` string.
    pub fn from_upstream(value: &str) -> Self {
        if value.eq_ignore_ascii_case("image") {
            FileType::Image
        } else {
            FileType::File
        }
    }

    /// Classifies a MIME type.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            FileType::Image
        } else {
            FileType::File
        }
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_type: FileType,
    pub file_name: String,
    /// Download URL; empty while the upload is still in flight.
    pub data_url: String,
}

/// Local-only delivery status. Never sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Known to the server.
    #[default]
    Confirmed,
    /// Optimistic placeholder awaiting the server.
    Pending,
    /// The server rejected the upload or the request never completed.
    Error(String),
}

/// A unit of conversation content in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    /// Sole ordering key. Messages without a timestamp sort last.
    pub created_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    /// Builds a confirmed text message.
    pub fn text(
        id: impl Into<String>,
        content: impl Into<String>,
        sender: Sender,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Message {
            id: MessageId(id.into()),
            content: content.into(),
            sender,
            created_at,
            attachments: Vec::new(),
            status: MessageStatus::Confirmed,
        }
    }

    /// Whether the visitor authored this message.
    pub fn is_outgoing(&self) -> bool {
        self.sender.kind == SenderKind::Contact
    }

    /// The only attachment that gets rendered.
    pub fn primary_attachment(&self) -> Option<&Attachment> {
        self.attachments.first()
    }

    /// Ascending timestamp order; untimestamped messages go last.
    pub fn chronological(a: &Message, b: &Message) -> Ordering {
        match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// A file selected by the visitor for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    /// Optional text sent along with the file.
    pub caption: Option<String>,
}

impl fmt::Debug for AttachmentUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .field("caption", &self.caption)
            .finish()
    }
}

/// A frame received on the realtime subscription channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CableEvent {
    Welcome,
    Ping,
    ConfirmSubscription,
    /// An agent message was created in the subscribed conversation.
    MessageCreated(Message),
    /// Any other frame; carries the event or frame type for logging.
    Other(String),
}

// --- Render projection types ---

/// Which side of the transcript a message is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Visual body of a rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Image {
        url: String,
        caption: Option<String>,
    },
    File {
        url: String,
        label: String,
    },
    /// Spinner shown while an upload is in flight.
    Uploading { file_name: String },
    /// Inline error left in place of a failed upload.
    UploadFailed { file_name: String, reason: String },
}

/// One row of the rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub id: MessageId,
    pub direction: Direction,
    pub author: Option<String>,
    pub body: MessageBody,
}
