// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Chatdesk support widget.
//!
//! Holds the canonical conversation types, the error taxonomy, and the
//! collaborator traits (network, storage, view) that the synchronizer is
//! built against.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ChatdeskError;
pub use traits::{ConversationView, KeyValueStore, SupportBackend};
pub use types::{
    Attachment, AttachmentUpload, CableEvent, ContactIdentity, ConversationId, Direction,
    FileType, Message, MessageBody, MessageId, MessageStatus, RenderedMessage, Sender, SenderKind,
};
