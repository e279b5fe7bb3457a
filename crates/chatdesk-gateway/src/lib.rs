// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay gateway between the Chatdesk widget and the Chatwoot service.
//!
//! The widget never sees the account credentials: it names an action (or a
//! destination URL, or a file to upload) and the relay attaches the
//! server-held token, forwards the request and hands the upstream answer
//! back unchanged.

pub mod handlers;
pub mod server;
pub mod upload;

use std::time::Duration;

use secrecy::SecretString;

pub use server::{build_router, start_server, RelayState};

/// Relay configuration (mirrors the `upstream` and `relay` sections of
/// `chatdesk-config`).
#[derive(Clone)]
pub struct RelayGatewayConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Scheme and host of the support service.
    pub base_url: String,
    /// Account id used by `/api/upload`.
    pub account_id: Option<String>,
    /// Token injected as the `api_access_token` header.
    pub api_access_token: Option<SecretString>,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
    /// Let `/api/proxy` reach hosts other than `base_url`.
    pub allow_any_proxy_host: bool,
    /// Timeout for every upstream request.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for RelayGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayGatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .field(
                "api_access_token",
                &self.api_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("allow_any_proxy_host", &self.allow_any_proxy_host)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
