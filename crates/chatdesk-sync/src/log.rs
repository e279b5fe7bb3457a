// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ordered, de-duplicated message list and the view edits it produces.
//!
//! Every mutation returns the [`RenderOp`]s that bring a view holding the
//! previous list up to date. Positions are indexes into the list as it stands
//! right after the op, so ops must be applied in order.

use std::cmp::Ordering;
use std::collections::HashSet;

use chatdesk_core::traits::ConversationView;
use chatdesk_core::types::{Message, MessageId, MessageStatus, RenderedMessage};

use crate::render::project;

/// One incremental edit of the rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    Insert {
        position: usize,
        message: RenderedMessage,
    },
    Replace {
        previous: MessageId,
        position: usize,
        message: RenderedMessage,
    },
    Remove {
        id: MessageId,
    },
}

impl RenderOp {
    pub fn apply(&self, view: &dyn ConversationView) {
        match self {
            RenderOp::Insert { position, message } => view.insert(*position, message),
            RenderOp::Replace {
                previous,
                position,
                message,
            } => view.replace(previous, *position, message),
            RenderOp::Remove { id } => view.remove(id),
        }
    }
}

/// Messages sorted by timestamp, unique by id.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.index_of(id).map(|i| &self.messages[i])
    }

    /// The newest server-confirmed message, skipping local placeholders.
    pub fn latest_confirmed(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.status == MessageStatus::Confirmed)
    }

    /// Appends every message whose id is not yet known.
    ///
    /// Messages already present are left untouched, including their rendered
    /// row. Ties on timestamp keep arrival order.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = Message>) -> Vec<RenderOp> {
        let mut ops = Vec::new();
        for message in incoming {
            if self.ids.contains(&message.id) {
                continue;
            }
            let position = self.insert_sorted(message);
            ops.push(RenderOp::Insert {
                position,
                message: project(&self.messages[position]),
            });
        }
        ops
    }

    /// Swaps a placeholder for the server's copy.
    ///
    /// When the confirmed message already arrived through a pull or a push,
    /// the placeholder is simply dropped.
    pub fn resolve_placeholder(
        &mut self,
        placeholder: &MessageId,
        confirmed: Message,
    ) -> Vec<RenderOp> {
        let Some(index) = self.index_of(placeholder) else {
            return self.merge([confirmed]);
        };
        self.messages.remove(index);
        self.ids.remove(placeholder);

        if self.ids.contains(&confirmed.id) {
            return vec![RenderOp::Remove {
                id: placeholder.clone(),
            }];
        }
        let position = self.insert_sorted(confirmed);
        vec![RenderOp::Replace {
            previous: placeholder.clone(),
            position,
            message: project(&self.messages[position]),
        }]
    }

    /// Marks a placeholder as failed. It stays in the list.
    pub fn mark_failed(&mut self, placeholder: &MessageId, reason: &str) -> Vec<RenderOp> {
        let Some(index) = self.index_of(placeholder) else {
            return Vec::new();
        };
        self.messages[index].status = MessageStatus::Error(reason.to_string());
        vec![RenderOp::Replace {
            previous: placeholder.clone(),
            position: index,
            message: project(&self.messages[index]),
        }]
    }

    /// The full projection, in order.
    pub fn render(&self) -> Vec<RenderedMessage> {
        self.messages.iter().map(project).collect()
    }

    fn index_of(&self, id: &MessageId) -> Option<usize> {
        if !self.ids.contains(id) {
            return None;
        }
        self.messages.iter().position(|m| &m.id == id)
    }

    fn insert_sorted(&mut self, message: Message) -> usize {
        let position = self.messages.partition_point(|existing| {
            Message::chronological(existing, &message) != Ordering::Greater
        });
        self.ids.insert(message.id.clone());
        self.messages.insert(position, message);
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::types::Sender;
    use chrono::{TimeZone, Utc};

    fn at(id: &str, secs: i64) -> Message {
        Message::text(id, id, Sender::contact(), Utc.timestamp_opt(secs, 0).single())
    }

    fn ids(log: &MessageLog) -> Vec<&str> {
        log.messages().iter().map(|m| m.id.0.as_str()).collect()
    }

    #[test]
    fn merge_fills_gaps_in_order_without_duplicates() {
        let mut log = MessageLog::new();
        log.merge([at("1", 10), at("3", 30)]);
        let ops = log.merge([at("1", 10), at("2", 20), at("3", 30)]);

        assert_eq!(ids(&log), ["1", "2", "3"]);
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RenderOp::Insert { position: 1, message } if message.id.0 == "2"));
    }

    #[test]
    fn out_of_order_batch_is_sorted() {
        let mut log = MessageLog::new();
        let ops = log.merge([at("c", 30), at("a", 10), at("b", 20)]);
        assert_eq!(ids(&log), ["a", "b", "c"]);
        let positions: Vec<usize> = ops
            .iter()
            .map(|op| match op {
                RenderOp::Insert { position, .. } => *position,
                other => panic!("unexpected op {other:?}"),
            })
            .collect();
        assert_eq!(positions, [0, 0, 1]);
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let mut log = MessageLog::new();
        log.merge([at("x", 10), at("y", 10)]);
        log.merge([at("z", 10)]);
        assert_eq!(ids(&log), ["x", "y", "z"]);
    }

    #[test]
    fn untimestamped_messages_go_last() {
        let mut log = MessageLog::new();
        log.merge([Message::text("n", "n", Sender::contact(), None), at("t", 5)]);
        assert_eq!(ids(&log), ["t", "n"]);
    }

    #[test]
    fn latest_confirmed_skips_placeholders() {
        let mut log = MessageLog::new();
        let at_20 = Utc.timestamp_opt(20, 0).single();
        let reply = Message::text("r", "hi", Sender::agent(None), at_20);
        let mut failed = at("temp_1", 99);
        failed.status = MessageStatus::Error("boom".into());
        log.merge([at("1", 10), reply, failed]);

        assert_eq!(ids(&log), ["1", "r", "temp_1"]);
        assert_eq!(log.latest_confirmed().map(|m| m.id.0.as_str()), Some("r"));
    }

    #[test]
    fn placeholder_is_replaced_in_place() {
        let mut log = MessageLog::new();
        log.merge([at("1", 10)]);
        let temp = MessageId::placeholder();
        let mut placeholder = Message::text(temp.0.clone(), "", Sender::contact(), None);
        placeholder.status = MessageStatus::Pending;
        log.merge([placeholder]);

        let ops = log.resolve_placeholder(&temp, at("2", 20));
        assert_eq!(ids(&log), ["1", "2"]);
        assert!(!log.contains(&temp));
        assert!(matches!(
            &ops[0],
            RenderOp::Replace { previous, position: 1, .. } if previous == &temp
        ));
    }

    #[test]
    fn placeholder_is_dropped_when_confirmation_already_arrived() {
        let mut log = MessageLog::new();
        let temp = MessageId::placeholder();
        log.merge([Message::text(temp.0.clone(), "", Sender::contact(), None)]);
        log.merge([at("9", 90)]);

        let ops = log.resolve_placeholder(&temp, at("9", 90));
        assert_eq!(ids(&log), ["9"]);
        assert_eq!(ops, vec![RenderOp::Remove { id: temp }]);
    }

    #[test]
    fn failed_placeholder_stays_with_error_status() {
        let mut log = MessageLog::new();
        let temp = MessageId::placeholder();
        log.merge([Message::text(temp.0.clone(), "", Sender::contact(), None)]);

        let ops = log.mark_failed(&temp, "boom");
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.get(&temp).map(|m| m.status.clone()),
            Some(MessageStatus::Error("boom".into()))
        );
        assert_eq!(ops.len(), 1);
    }
}
