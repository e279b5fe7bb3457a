// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the Chatwoot client API, the relay surface and the
//! ActionCable channel, plus their conversion into canonical types.

use std::fmt;

use chatdesk_core::types::{
    Attachment, ContactIdentity, FileType, Message, MessageId, MessageStatus, Sender, SenderKind,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

/// Timestamps above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// An identifier that upstream may encode as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Num(i64),
    Text(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireId::Num(n) => write!(f, "{n}"),
            WireId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for WireId {
    fn from(value: &str) -> Self {
        WireId::Text(value.to_string())
    }
}

/// A timestamp as epoch seconds, epoch milliseconds or a date string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

impl WireTimestamp {
    /// Converts to UTC, or `None` when the value cannot be interpreted.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Int(n) => from_epoch(*n),
            WireTimestamp::Float(f) => {
                let f = if f.abs() > MILLIS_THRESHOLD as f64 {
                    f / 1000.0
                } else {
                    *f
                };
                let secs = f.trunc() as i64;
                let nanos = ((f - f.trunc()) * 1e9) as u32;
                Utc.timestamp_opt(secs, nanos).single()
            }
            WireTimestamp::Text(s) => {
                let trimmed = s.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    return from_epoch(n);
                }
                DateTime::parse_from_rfc3339(trimmed)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }
        }
    }
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.abs() > MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

/// `message_type` is `0`/`1`/`2` on most endpoints and a name on some.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireMessageType {
    Code(i64),
    Name(String),
}

impl WireMessageType {
    /// Numeric code of an agent-authored message.
    pub const OUTGOING: i64 = 1;

    /// Whether this marks a message written by the visitor.
    pub fn is_incoming(&self) -> bool {
        match self {
            WireMessageType::Code(code) => *code == 0,
            WireMessageType::Name(name) => name.eq_ignore_ascii_case("incoming"),
        }
    }

    /// Whether this marks a message written by an agent.
    pub fn is_outgoing(&self) -> bool {
        match self {
            WireMessageType::Code(code) => *code == Self::OUTGOING,
            WireMessageType::Name(name) => name.eq_ignore_ascii_case("outgoing"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSender {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAttachment {
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub data_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub thumb_url: Option<String>,
}

impl WireAttachment {
    fn into_attachment(self) -> Attachment {
        let data_url = self.data_url.or(self.thumb_url).unwrap_or_default();
        let file_name = self
            .file_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| file_name_from_url(&data_url));
        Attachment {
            file_type: self
                .file_type
                .as_deref()
                .map(FileType::from_upstream)
                .unwrap_or(FileType::File),
            file_name,
            data_url,
        }
    }
}

/// Last path segment of a URL, without query or fragment.
fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .filter(|segment| !segment.contains(':'))
        .unwrap_or("attachment")
        .to_string()
}

/// A message as any upstream endpoint or cable frame encodes it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: WireId,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<WireMessageType>,
    #[serde(default)]
    pub created_at: Option<WireTimestamp>,
    #[serde(default)]
    pub created_at_utc: Option<WireTimestamp>,
    #[serde(default)]
    pub sender: Option<WireSender>,
    #[serde(default)]
    pub attachments: Vec<WireAttachment>,
}

impl WireMessage {
    /// Who authored the message.
    ///
    /// An explicit `sender.type` wins; otherwise `message_type` decides, and
    /// a message carrying neither is treated as coming from an agent.
    pub fn sender_kind(&self) -> SenderKind {
        if let Some(kind) = self.sender.as_ref().and_then(|s| s.kind.as_deref()) {
            return if kind.eq_ignore_ascii_case("contact") {
                SenderKind::Contact
            } else {
                SenderKind::Agent
            };
        }
        match &self.message_type {
            Some(t) if t.is_incoming() => SenderKind::Contact,
            _ => SenderKind::Agent,
        }
    }

    /// Normalizes into the canonical [`Message`].
    pub fn into_message(self) -> Message {
        let kind = self.sender_kind();
        let created_at = self
            .created_at
            .as_ref()
            .or(self.created_at_utc.as_ref())
            .and_then(WireTimestamp::to_utc);
        if created_at.is_none() {
            debug!(id = %self.id, "message has no usable timestamp");
        }
        let name = self.sender.and_then(|s| s.name);
        Message {
            id: MessageId(self.id.to_string()),
            content: self.content.unwrap_or_default(),
            sender: Sender { kind, name },
            created_at,
            attachments: self
                .attachments
                .into_iter()
                .map(WireAttachment::into_attachment)
                .collect(),
            status: MessageStatus::Confirmed,
        }
    }
}

/// Response of `POST /contacts`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireContact {
    pub source_id: String,
    pub pubsub_token: String,
}

impl From<WireContact> for ContactIdentity {
    fn from(contact: WireContact) -> Self {
        ContactIdentity {
            identifier: contact.source_id,
            pubsub_token: contact.pubsub_token,
        }
    }
}

/// Response of `POST /contacts/{contact}/conversations`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireConversation {
    pub id: WireId,
}

/// Body the relay returns from `/api/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadEnvelope {
    #[serde(default)]
    pub success: bool,
    pub data: Option<WireMessage>,
    #[serde(default)]
    pub error: Option<String>,
}

// --- Relay surface ---

/// Operation requested of the relay's `/api/chatwoot` route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RelayAction {
    CreateContact,
    CreateConversation,
    SendMessage,
    ListMessages,
}

/// Body of a relay action request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub payload: RelayPayload,
}

impl RelayRequest {
    pub fn new(action: RelayAction, payload: RelayPayload) -> Self {
        RelayRequest {
            action: action.to_string(),
            payload,
        }
    }
}

/// Parameters of a relay action. Field names follow the browser widget.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<WireId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of a relay proxy request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// URL builder for the public client API of one inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxPaths {
    inbox_url: String,
}

impl InboxPaths {
    pub fn new(base_url: &str, inbox_identifier: &str) -> Self {
        InboxPaths {
            inbox_url: format!(
                "{}/public/api/v1/inboxes/{inbox_identifier}",
                base_url.trim_end_matches('/')
            ),
        }
    }

    pub fn contacts(&self) -> String {
        format!("{}/contacts", self.inbox_url)
    }

    pub fn conversations(&self, contact: &str) -> String {
        format!("{}/contacts/{contact}/conversations", self.inbox_url)
    }

    pub fn messages(&self, contact: &str, conversation: &str) -> String {
        format!(
            "{}/contacts/{contact}/conversations/{conversation}/messages",
            self.inbox_url
        )
    }
}

/// Account API endpoint the relay posts attachments to.
pub fn account_messages_url(base_url: &str, account_id: &str, conversation: &str) -> String {
    format!(
        "{}/api/v1/accounts/{account_id}/conversations/{conversation}/messages",
        base_url.trim_end_matches('/')
    )
}
