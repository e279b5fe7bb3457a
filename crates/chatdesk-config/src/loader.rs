// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/chatdesk/chatdesk.toml`
//! 3. `~/.config/chatdesk/chatdesk.toml`
//! 4. `./chatdesk.toml`, or an explicit `--config` path instead of 2-4
//! 5. `CHATDESK_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChatdeskConfig;

/// Config sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &["logging", "upstream", "relay", "widget"];

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/chatdesk/chatdesk.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "chatdesk.toml";

/// Per-user config file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chatdesk").join("chatdesk.toml"))
}

/// Builds the full hierarchy Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChatdeskConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Loads configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<ChatdeskConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from a single file with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChatdeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatdeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Loads configuration from an inline TOML string (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChatdeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatdeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// `CHATDESK_*` provider mapping the first underscore-separated segment to a
/// section. `CHATDESK_UPSTREAM_API_ACCESS_TOKEN` becomes
/// `upstream.api_access_token`, not `upstream.api.access.token`.
fn env_provider() -> Env {
    Env::prefixed("CHATDESK_").map(|key| {
        let key_str = key.as_str();
        for section in ENV_SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.to_string().into()
    })
}
