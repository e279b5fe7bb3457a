// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation of semantic constraints.

use crate::diagnostic::ConfigError;
use crate::model::{ChatdeskConfig, WidgetMode};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration, collecting every failure.
pub fn validate_config(config: &ChatdeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level `{}` must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if !is_http_url(&config.upstream.base_url) {
        errors.push(ConfigError::validation(format!(
            "upstream.base_url `{}` must start with http:// or https://",
            config.upstream.base_url
        )));
    }

    if let Some(cable) = &config.upstream.cable_url {
        if !(cable.starts_with("ws://") || cable.starts_with("wss://")) {
            errors.push(ConfigError::validation(format!(
                "upstream.cable_url `{cable}` must start with ws:// or wss://"
            )));
        }
    }

    if config.upstream.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "upstream.request_timeout_secs must be at least 1",
        ));
    }

    if config.relay.host.trim().is_empty() {
        errors.push(ConfigError::validation("relay.host must not be empty"));
    }

    if config.relay.max_upload_bytes == 0 {
        errors.push(ConfigError::validation(
            "relay.max_upload_bytes must be greater than zero",
        ));
    }

    if config.widget.mode == WidgetMode::Relay && !is_http_url(&config.widget.relay_url) {
        errors.push(ConfigError::validation(format!(
            "widget.relay_url `{}` must start with http:// or https://",
            config.widget.relay_url
        )));
    }

    for (key, value) in [
        ("widget.poll_interval_ms", config.widget.poll_interval_ms),
        ("widget.typing_delay_ms", config.widget.typing_delay_ms),
        (
            "widget.rapid_typing_delay_ms",
            config.widget.rapid_typing_delay_ms,
        ),
        ("widget.cookie_ttl_days", config.widget.cookie_ttl_days),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be greater than zero"
            )));
        }
    }

    if config.widget.cookie_jar.trim().is_empty() {
        errors.push(ConfigError::validation("widget.cookie_jar must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
