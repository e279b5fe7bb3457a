// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable client-side key-value persistence with expiry.

use std::time::Duration;

use crate::error::ChatdeskError;

/// Cookie-like persistence for identifiers that outlive a session.
///
/// Expired entries behave exactly like absent ones.
pub trait KeyValueStore: Send + Sync {
    /// Returns the live value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, ChatdeskError>;

    /// Stores `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ChatdeskError>;

    /// Removes `key` if present.
    fn remove(&self, key: &str) -> Result<(), ChatdeskError>;
}
