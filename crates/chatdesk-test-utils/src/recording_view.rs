// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording view for asserting on what the visitor would see.
//!
//! `RecordingView` applies every edit to its own copy of the transcript and
//! keeps an ordered event log, so tests can check both the final rows and
//! how they got there.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chatdesk_core::traits::ConversationView;
use chatdesk_core::types::{MessageId, RenderedMessage};

/// One call received by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Insert { position: usize, id: MessageId },
    Replace {
        previous: MessageId,
        position: usize,
        id: MessageId,
    },
    Remove { id: MessageId },
    Typing(bool),
    InputEnabled(bool),
    ClearInput,
    Status(String),
    Alert(String),
}

#[derive(Default)]
struct Record {
    rows: Vec<RenderedMessage>,
    events: Vec<ViewEvent>,
    typing: bool,
    input_enabled: bool,
}

/// A view that remembers everything.
#[derive(Default)]
pub struct RecordingView {
    record: Mutex<Record>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows currently displayed, top to bottom.
    pub fn rows(&self) -> Vec<RenderedMessage> {
        self.record().rows.clone()
    }

    /// Ids of the displayed rows, top to bottom.
    pub fn row_ids(&self) -> Vec<String> {
        self.record().rows.iter().map(|r| r.id.0.clone()).collect()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.record().events.clone()
    }

    /// Number of rows ever inserted for `id`.
    pub fn insert_count(&self, id: &str) -> usize {
        self.record()
            .events
            .iter()
            .filter(|e| matches!(e, ViewEvent::Insert { id: inserted, .. } if inserted.0 == id))
            .count()
    }

    pub fn typing_visible(&self) -> bool {
        self.record().typing
    }

    pub fn input_enabled(&self) -> bool {
        self.record().input_enabled
    }

    pub fn alerts(&self) -> Vec<String> {
        self.record()
            .events
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Alert(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// The latest status line.
    pub fn status(&self) -> Option<String> {
        self.record().events.iter().rev().find_map(|e| match e {
            ViewEvent::Status(text) => Some(text.clone()),
            _ => None,
        })
    }
}

impl ConversationView for RecordingView {
    fn insert(&self, position: usize, message: &RenderedMessage) {
        let mut record = self.record();
        let position = position.min(record.rows.len());
        record.rows.insert(position, message.clone());
        record.events.push(ViewEvent::Insert {
            position,
            id: message.id.clone(),
        });
    }

    fn replace(&self, previous: &MessageId, position: usize, message: &RenderedMessage) {
        let mut record = self.record();
        record.rows.retain(|row| &row.id != previous);
        let position = position.min(record.rows.len());
        record.rows.insert(position, message.clone());
        record.events.push(ViewEvent::Replace {
            previous: previous.clone(),
            position,
            id: message.id.clone(),
        });
    }

    fn remove(&self, id: &MessageId) {
        let mut record = self.record();
        record.rows.retain(|row| &row.id != id);
        record.events.push(ViewEvent::Remove { id: id.clone() });
    }

    fn set_typing(&self, visible: bool) {
        let mut record = self.record();
        record.typing = visible;
        record.events.push(ViewEvent::Typing(visible));
    }

    fn set_input_enabled(&self, enabled: bool) {
        let mut record = self.record();
        record.input_enabled = enabled;
        record.events.push(ViewEvent::InputEnabled(enabled));
    }

    fn clear_input(&self) {
        self.record().events.push(ViewEvent::ClearInput);
    }

    fn show_status(&self, status: &str) {
        self.record().events.push(ViewEvent::Status(status.to_string()));
    }

    fn alert(&self, message: &str) {
        self.record().events.push(ViewEvent::Alert(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::types::{Direction, MessageBody};

    fn row(id: &str) -> RenderedMessage {
        RenderedMessage {
            id: MessageId(id.into()),
            direction: Direction::Outgoing,
            author: None,
            body: MessageBody::Text(id.into()),
        }
    }

    #[test]
    fn mirrors_inserts_replacements_and_removals() {
        let view = RecordingView::new();
        view.insert(0, &row("b"));
        view.insert(0, &row("a"));
        view.insert(2, &row("temp_1"));
        view.replace(&MessageId("temp_1".into()), 1, &row("c"));
        assert_eq!(view.row_ids(), ["a", "c", "b"]);

        view.remove(&MessageId("c".into()));
        assert_eq!(view.row_ids(), ["a", "b"]);
        assert_eq!(view.insert_count("a"), 1);
    }

    #[test]
    fn tracks_ui_flags() {
        let view = RecordingView::new();
        view.set_typing(true);
        view.set_input_enabled(true);
        view.show_status("Connected");
        view.alert("oops");
        assert!(view.typing_visible());
        assert!(view.input_enabled());
        assert_eq!(view.status().as_deref(), Some("Connected"));
        assert_eq!(view.alerts(), ["oops"]);
    }
}
