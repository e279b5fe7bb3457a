// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Render target driven by the synchronizer.

use crate::types::{MessageId, RenderedMessage};

/// Incremental render sink.
///
/// The view always holds a chronologically sorted subset of the transcript.
/// Positions passed to [`insert`](ConversationView::insert) and
/// [`replace`](ConversationView::replace) index into that subset after the
/// operation is applied. The typing indicator, when visible, is drawn after
/// the last message.
pub trait ConversationView: Send + Sync {
    /// Inserts a newly rendered message at `position`.
    fn insert(&self, position: usize, message: &RenderedMessage);

    /// Removes the row for `previous` and draws `message` at `position`.
    fn replace(&self, previous: &MessageId, position: usize, message: &RenderedMessage);

    /// Removes the row for `id`.
    fn remove(&self, id: &MessageId);

    /// Shows or hides the typing indicator.
    fn set_typing(&self, visible: bool);

    /// Enables or disables the message input.
    fn set_input_enabled(&self, enabled: bool);

    /// Clears the message input.
    fn clear_input(&self);

    /// Updates the connection status line.
    fn show_status(&self, status: &str);

    /// Surfaces a failure to the visitor.
    fn alert(&self, message: &str);
}
