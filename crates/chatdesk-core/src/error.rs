// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by the relay gateway, the backend clients and the
//! conversation synchronizer.

use thiserror::Error;

/// The primary error type used across Chatdesk collaborators and operations.
#[derive(Debug, Error)]
pub enum ChatdeskError {
    /// A required credential or setting is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller omitted a required field or sent an unusable value.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The upstream support service answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The request never produced a response (connect, TLS, timeout, reset).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Client-side persistence failed.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The realtime subscription channel failed or closed.
    #[error("realtime channel error: {0}")]
    Realtime(String),

    /// An upload exceeded the configured size limit.
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatdeskError {
    /// Builds a transport error from any underlying error.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ChatdeskError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds a serialization error from any underlying error.
    pub fn serialization<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ChatdeskError::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// HTTP status code the relay answers with when this error reaches it.
    pub fn http_status(&self) -> u16 {
        match self {
            ChatdeskError::Config(_) => 500,
            ChatdeskError::InvalidRequest(_) => 400,
            ChatdeskError::Upstream { status, .. } => *status,
            ChatdeskError::Transport { .. } => 502,
            ChatdeskError::Serialization { .. } => 502,
            ChatdeskError::Storage { .. } => 500,
            ChatdeskError::Realtime(_) => 502,
            ChatdeskError::PayloadTooLarge { .. } => 413,
            ChatdeskError::Internal(_) => 500,
        }
    }
}
