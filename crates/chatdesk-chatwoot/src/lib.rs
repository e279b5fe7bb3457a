// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatwoot backends for Chatdesk.
//!
//! Two [`SupportBackend`](chatdesk_core::SupportBackend) implementations share
//! one wire-to-canonical conversion:
//! - [`PublicApiClient`] talks to the public client API directly.
//! - [`RelayClient`] goes through the credential-holding relay.
//!
//! [`CableClient`] subscribes to the realtime ActionCable channel.

pub mod cable;
pub mod client;
mod http;
pub mod relay;
pub mod types;

pub use cable::{parse_frame, subscribe_command, CableClient, CableStream};
pub use client::PublicApiClient;
pub use relay::RelayClient;
pub use types::{
    account_messages_url, InboxPaths, ProxyRequest, RelayAction, RelayPayload, RelayRequest,
    WireMessage,
};
