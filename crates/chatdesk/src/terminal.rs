// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of a conversation.
//!
//! A terminal cannot redraw earlier lines, so every edit is printed as it
//! arrives: inserts as new rows, replacements as updated rows and removals
//! as a dimmed note.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chatdesk_core::traits::ConversationView;
use chatdesk_core::types::{AttachmentUpload, Direction, MessageBody, MessageId, RenderedMessage};
use chatdesk_core::ChatdeskError;
use colored::Colorize;

/// One line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Message(String),
    Attach {
        path: String,
        caption: Option<String>,
    },
    /// `/attach` without a path.
    AttachUsage,
}

pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if trimmed == "/quit" || trimmed == "/exit" {
        return Input::Quit;
    }
    if let Some(rest) = trimmed.strip_prefix("/attach") {
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return Input::Message(trimmed.to_string());
        }
        let rest = rest.trim_start();
        let (path, caption) = match rest.split_once(char::is_whitespace) {
            Some((path, caption)) => (path, Some(caption.trim())),
            None => (rest, None),
        };
        if path.is_empty() {
            return Input::AttachUsage;
        }
        return Input::Attach {
            path: path.to_string(),
            caption: caption.filter(|c| !c.is_empty()).map(str::to_string),
        };
    }
    Input::Message(trimmed.to_string())
}

/// MIME type guessed from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Reads a local file into an upload.
pub async fn read_upload(path: &str, caption: Option<String>) -> Result<AttachmentUpload, ChatdeskError> {
    let path = Path::new(path);
    let data = tokio::fs::read(path).await.map_err(|e| {
        ChatdeskError::InvalidRequest(format!("cannot read {}: {e}", path.display()))
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(AttachmentUpload {
        file_name,
        mime_type: mime_for_path(path).to_string(),
        data,
        caption,
    })
}

/// Plain-text form of a row: who said it and what.
pub fn describe(message: &RenderedMessage) -> (String, String) {
    let who = match message.direction {
        Direction::Outgoing => "you".to_string(),
        Direction::Incoming => message.author.clone().unwrap_or_else(|| "support".to_string()),
    };
    let what = match &message.body {
        MessageBody::Text(text) => text.clone(),
        MessageBody::Image { url, caption } => match caption {
            Some(caption) => format!("{caption} [image: {url}]"),
            None => format!("[image: {url}]"),
        },
        MessageBody::File { url, label } => format!("{label} [{url}]"),
        MessageBody::Uploading { file_name } => format!("uploading {file_name}..."),
        MessageBody::UploadFailed { file_name, reason } => {
            format!("upload of {file_name} failed: {reason}")
        }
    };
    (who, what)
}

fn print_row(message: &RenderedMessage, updated: bool) {
    let (who, what) = describe(message);
    let who = match message.direction {
        Direction::Outgoing => who.cyan().bold(),
        Direction::Incoming => who.green().bold(),
    };
    let what = match message.body {
        MessageBody::UploadFailed { .. } => what.red(),
        MessageBody::Uploading { .. } => what.dimmed(),
        _ => what.normal(),
    };
    if updated {
        println!("{who}: {what} {}", "(updated)".dimmed());
    } else {
        println!("{who}: {what}");
    }
}

/// A [`ConversationView`] printing to stdout.
#[derive(Default)]
pub struct TerminalView {
    input_enabled: AtomicBool,
    typing: AtomicBool,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled.load(Ordering::SeqCst)
    }
}

impl ConversationView for TerminalView {
    fn insert(&self, _position: usize, message: &RenderedMessage) {
        print_row(message, false);
    }

    fn replace(&self, _previous: &MessageId, _position: usize, message: &RenderedMessage) {
        print_row(message, true);
    }

    fn remove(&self, id: &MessageId) {
        tracing::debug!(%id, "row removed");
    }

    fn set_typing(&self, visible: bool) {
        let was_visible = self.typing.swap(visible, Ordering::SeqCst);
        if visible && !was_visible {
            println!("{}", "support is typing...".dimmed().italic());
        }
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.input_enabled.store(enabled, Ordering::SeqCst);
    }

    fn clear_input(&self) {}

    fn show_status(&self, status: &str) {
        println!("{}", status.yellow());
    }

    fn alert(&self, message: &str) {
        eprintln!("{} {message}", "!".red().bold());
    }
}
