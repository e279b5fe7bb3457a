// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Projection of canonical messages into view rows.

use chatdesk_core::types::{
    Direction, FileType, Message, MessageBody, MessageStatus, RenderedMessage,
};

/// Renders one message. Only the first attachment is drawn.
pub fn project(message: &Message) -> RenderedMessage {
    let direction = if message.is_outgoing() {
        Direction::Outgoing
    } else {
        Direction::Incoming
    };
    let author = match direction {
        Direction::Incoming => message.sender.name.clone(),
        Direction::Outgoing => None,
    };
    RenderedMessage {
        id: message.id.clone(),
        direction,
        author,
        body: body(message),
    }
}

fn body(message: &Message) -> MessageBody {
    let attachment = message.primary_attachment();
    let file_name = || {
        attachment
            .map(|a| a.file_name.clone())
            .unwrap_or_else(|| "message".to_string())
    };

    match &message.status {
        MessageStatus::Pending if attachment.is_some() => {
            return MessageBody::Uploading {
                file_name: file_name(),
            };
        }
        MessageStatus::Error(reason) => {
            return MessageBody::UploadFailed {
                file_name: file_name(),
                reason: reason.clone(),
            };
        }
        _ => {}
    }

    let Some(attachment) = attachment else {
        return MessageBody::Text(message.content.clone());
    };
    let caption = Some(message.content.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    match attachment.file_type {
        FileType::Image => MessageBody::Image {
            url: attachment.data_url.clone(),
            caption,
        },
        FileType::File => MessageBody::File {
            url: attachment.data_url.clone(),
            label: caption.unwrap_or_else(|| format!("File: {}", attachment.file_name)),
        },
    }
}
