// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatdesk serve` command implementation.
//!
//! Runs the relay gateway until it fails or the process receives Ctrl+C.

use std::time::Duration;

use chatdesk_config::ChatdeskConfig;
use chatdesk_core::ChatdeskError;
use chatdesk_gateway::RelayGatewayConfig;
use secrecy::SecretString;
use tracing::{info, warn};

/// Maps the loaded configuration onto the gateway's settings.
pub fn relay_gateway_config(config: &ChatdeskConfig) -> RelayGatewayConfig {
    RelayGatewayConfig {
        host: config.relay.host.clone(),
        port: config.relay.port,
        base_url: config.upstream.base_url.clone(),
        account_id: config.upstream.account_id.clone(),
        api_access_token: config
            .upstream
            .api_access_token
            .clone()
            .map(SecretString::from),
        max_upload_bytes: config.relay.max_upload_bytes,
        allow_any_proxy_host: config.relay.allow_any_proxy_host,
        request_timeout: Duration::from_secs(config.upstream.request_timeout_secs),
    }
}

/// Runs the `chatdesk serve` relay.
pub async fn run_serve(config: ChatdeskConfig) -> Result<(), ChatdeskError> {
    let gateway = relay_gateway_config(&config);
    if gateway.api_access_token.is_none() {
        warn!("upstream.api_access_token is not set; /api/chatwoot and /api/upload will answer 500");
    }
    if gateway.account_id.is_none() {
        warn!("upstream.account_id is not set; /api/upload will answer 500");
    }
    info!(config = ?gateway, "starting relay");

    tokio::select! {
        result = chatdesk_gateway::start_server(gateway) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping relay");
            Ok(())
        }
    }
}
