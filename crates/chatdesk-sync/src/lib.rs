// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation synchronization for the Chatdesk widget.
//!
//! The [`Synchronizer`] reconciles sends, uploads, periodic pulls and
//! realtime pushes into one ordered, de-duplicated transcript and keeps a
//! [`ConversationView`](chatdesk_core::ConversationView) in step with it
//! through incremental edits.

pub mod log;
pub mod render;
pub mod store;
pub mod synchronizer;
pub mod typing;

pub use log::{MessageLog, RenderOp};
pub use render::project;
pub use store::{CookieFileStore, MemoryStore};
pub use synchronizer::{
    IgnoreReason, Merge, Outcome, SyncSettings, Synchronizer, CONTACT_IDENTIFIER_KEY,
    CONVERSATION_ID_KEY, PUBSUB_TOKEN_KEY,
};
pub use typing::{plan_typing, TypingPlan, TypingTimings};
