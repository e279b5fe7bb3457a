// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the relay.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use chatdesk_core::ChatdeskError;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::upload;
use crate::RelayGatewayConfig;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct RelayState {
    /// Relay settings and credentials.
    pub config: Arc<RelayGatewayConfig>,
    /// Pooled client for upstream calls.
    pub http: reqwest::Client,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl RelayState {
    pub fn new(config: RelayGatewayConfig) -> Result<Self, ChatdeskError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChatdeskError::transport("failed to build relay HTTP client", e))?;
        Ok(Self {
            config: Arc::new(config),
            http,
            start_time: Instant::now(),
        })
    }
}

/// Builds the relay router:
/// - POST /api/chatwoot (credentialed actions)
/// - POST /api/proxy (uncredentialed forwarding)
/// - POST /api/upload (multipart attachment upload)
/// - GET /health
pub fn build_router(state: RelayState) -> Router {
    let api_routes = Router::new()
        .route(
            "/api/chatwoot",
            post(handlers::post_chatwoot).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/proxy",
            post(handlers::post_proxy).fallback(handlers::method_not_allowed),
        )
        .with_state(state.clone());

    // The upload handler enforces its own size cap while streaming.
    let upload_routes = Router::new()
        .route(
            "/api/upload",
            post(upload::post_upload).fallback(handlers::method_not_allowed),
        )
        .layer(DefaultBodyLimit::disable())
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(upload_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Start the relay server and serve until the listener fails.
pub async fn start_server(config: RelayGatewayConfig) -> Result<(), ChatdeskError> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(RelayState::new(config)?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChatdeskError::transport(format!("failed to bind relay to {addr}"), e))?;

    tracing::info!("Relay listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| ChatdeskError::transport("relay server error", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> RelayGatewayConfig {
        RelayGatewayConfig {
            host: "127.0.0.1".into(),
            port: 0,
            base_url: "http://localhost".into(),
            account_id: None,
            api_access_token: None,
            max_upload_bytes: 16,
            allow_any_proxy_host: false,
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn relay_state_is_clone() {
        let state = RelayState::new(config()).unwrap();
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let mut bad = config();
        bad.host = "not a host".into();
        let err = start_server(bad).await.unwrap_err();
        assert!(err.to_string().contains("failed to bind relay"));
    }
}
