// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical test data.

use chrono::{TimeZone, Utc};

use chatdesk_core::types::{AttachmentUpload, ContactIdentity, Message, Sender};

pub fn contact_identity() -> ContactIdentity {
    ContactIdentity {
        identifier: "contact-fixture".into(),
        pubsub_token: "pubsub-fixture".into(),
    }
}

/// A visitor message at `secs` past the epoch.
pub fn contact_message(id: &str, content: &str, secs: i64) -> Message {
    Message::text(id, content, Sender::contact(), Utc.timestamp_opt(secs, 0).single())
}

/// An agent message at `secs` past the epoch.
pub fn agent_message(id: &str, content: &str, secs: i64) -> Message {
    Message::text(
        id,
        content,
        Sender::agent(Some("Agent".into())),
        Utc.timestamp_opt(secs, 0).single(),
    )
}

pub fn image_upload(caption: Option<&str>) -> AttachmentUpload {
    AttachmentUpload {
        file_name: "screenshot.png".into(),
        mime_type: "image/png".into(),
        data: vec![0x89, b'P', b'N', b'G'],
        caption: caption.map(str::to_string),
    }
}

pub fn file_upload() -> AttachmentUpload {
    AttachmentUpload {
        file_name: "invoice.pdf".into(),
        mime_type: "application/pdf".into(),
        data: b"%PDF-1.4".to_vec(),
        caption: None,
    }
}
