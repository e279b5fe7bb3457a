// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so that a misspelled key
//! is reported at startup instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level Chatdesk configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatdeskConfig {
    /// Log verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upstream support service.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Relay gateway listener and limits.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Terminal widget and synchronizer behaviour.
    #[serde(default)]
    pub widget: WidgetConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Upstream support service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Scheme and host of the support service, e.g. `https://app.chatwoot.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Public inbox identifier the widget talks to.
    #[serde(default)]
    pub inbox_identifier: Option<String>,

    /// Account id used by the relay's upload endpoint.
    #[serde(default)]
    pub account_id: Option<String>,

    /// Server-held API access token injected by the relay. Never sent to
    /// the widget.
    #[serde(default)]
    pub api_access_token: Option<String>,

    /// Realtime endpoint. Derived from `base_url` when unset.
    #[serde(default)]
    pub cable_url: Option<String>,

    /// Timeout applied to every upstream HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            inbox_identifier: None,
            account_id: None,
            api_access_token: None,
            cable_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    /// The realtime endpoint, explicit or derived from `base_url`.
    pub fn resolved_cable_url(&self) -> String {
        if let Some(url) = &self.cable_url {
            return url.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("wss://{base}")
        };
        format!("{ws_base}/cable")
    }
}

fn default_base_url() -> String {
    "https://app.chatwoot.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Relay gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Host address to bind.
    #[serde(default = "default_relay_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// Largest accepted upload body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Let `/api/proxy` forward to hosts other than `upstream.base_url`.
    #[serde(default)]
    pub allow_any_proxy_host: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_relay_host(),
            port: default_relay_port(),
            max_upload_bytes: default_max_upload_bytes(),
            allow_any_proxy_host: false,
        }
    }
}

fn default_relay_host() -> String {
    "127.0.0.1".to_string()
}

fn default_relay_port() -> u16 {
    3000
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

/// How the widget reaches the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetMode {
    /// Through the relay gateway (credentials stay server-side).
    #[default]
    Relay,
    /// Straight to the public client API.
    Direct,
}

/// When the send lock is released after a successful send or upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReleaseMode {
    /// As soon as the send's own response arrives.
    #[default]
    OnResponse,
    /// Only once a pull or push observes an agent reply.
    OnReply,
}

/// Terminal widget and synchronizer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WidgetConfig {
    /// Relay or direct access.
    #[serde(default)]
    pub mode: WidgetMode,

    /// Base URL of the relay gateway (relay mode).
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Periodic pull interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Typing indicator delay after a send.
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,

    /// Shortened typing indicator delay for rapid consecutive sends.
    #[serde(default = "default_rapid_typing_delay_ms")]
    pub rapid_typing_delay_ms: u64,

    /// Two sends closer than this count as rapid.
    #[serde(default = "default_rapid_send_window_ms")]
    pub rapid_send_window_ms: u64,

    /// Send lock release policy.
    #[serde(default)]
    pub lock_release: LockReleaseMode,

    /// Path of the cookie jar holding contact and conversation ids.
    #[serde(default = "default_cookie_jar")]
    pub cookie_jar: String,

    /// Lifetime of persisted identifiers.
    #[serde(default = "default_cookie_ttl_days")]
    pub cookie_ttl_days: u64,

    /// Display name prefix for new visitors.
    #[serde(default = "default_visitor_name_prefix")]
    pub visitor_name_prefix: String,

    /// Subscribe to realtime pushes in addition to polling.
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            mode: WidgetMode::default(),
            relay_url: default_relay_url(),
            poll_interval_ms: default_poll_interval_ms(),
            typing_delay_ms: default_typing_delay_ms(),
            rapid_typing_delay_ms: default_rapid_typing_delay_ms(),
            rapid_send_window_ms: default_rapid_send_window_ms(),
            lock_release: LockReleaseMode::default(),
            cookie_jar: default_cookie_jar(),
            cookie_ttl_days: default_cookie_ttl_days(),
            visitor_name_prefix: default_visitor_name_prefix(),
            realtime: default_realtime(),
        }
    }
}

fn default_relay_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_typing_delay_ms() -> u64 {
    3000
}

fn default_rapid_typing_delay_ms() -> u64 {
    2000
}

fn default_rapid_send_window_ms() -> u64 {
    2000
}

fn default_cookie_jar() -> String {
    dirs::data_dir()
        .map(|p| p.join("chatdesk").join("cookies.txt"))
        .unwrap_or_else(|| std::path::PathBuf::from("chatdesk-cookies.txt"))
        .to_string_lossy()
        .to_string()
}

fn default_cookie_ttl_days() -> u64 {
    30
}

fn default_visitor_name_prefix() -> String {
    "Visitor".to_string()
}

fn default_realtime() -> bool {
    true
}
