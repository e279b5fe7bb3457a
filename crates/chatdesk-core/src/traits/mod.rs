// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits injected into the conversation synchronizer.

pub mod backend;
pub mod store;
pub mod view;

pub use backend::SupportBackend;
pub use store::KeyValueStore;
pub use view::ConversationView;
