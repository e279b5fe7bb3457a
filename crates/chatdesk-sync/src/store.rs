// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side persistence of the visitor session.
//!
//! [`CookieFileStore`] keeps values as cookie lines
//! (`name=value; expires=<HTTP-date>; path=/`) so a session survives
//! restarts for the configured lifetime.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chatdesk_core::traits::KeyValueStore;
use chatdesk_core::ChatdeskError;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

/// `expires` attribute format (RFC 1123, always GMT).
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

fn expiry_after(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn poisoned(what: &str) -> ChatdeskError {
    ChatdeskError::Internal(format!("{what} lock poisoned"))
}

/// In-memory store with expiry.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ChatdeskError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned("memory store"))?;
        match entries.get(key) {
            Some((_, expires)) if *expires <= Utc::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ChatdeskError> {
        self.entries
            .lock()
            .map_err(|_| poisoned("memory store"))?
            .insert(key.to_string(), (value.to_string(), expiry_after(ttl)));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ChatdeskError> {
        self.entries
            .lock()
            .map_err(|_| poisoned("memory store"))?
            .remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    name: String,
    value: String,
    expires: DateTime<Utc>,
}

impl Cookie {
    fn to_line(&self) -> String {
        format!(
            "{}={}; expires={}; path=/",
            self.name,
            self.value,
            self.expires.format(HTTP_DATE)
        )
    }

    fn parse(line: &str) -> Option<Cookie> {
        let mut parts = line.split(';').map(str::trim);
        let (name, value) = parts.next()?.split_once('=')?;
        let mut expires = None;
        for attribute in parts {
            if let Some(date) = attribute.strip_prefix("expires=") {
                expires = NaiveDateTime::parse_from_str(date, HTTP_DATE)
                    .ok()
                    .map(|naive| naive.and_utc());
            }
        }
        Some(Cookie {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
            expires: expires?,
        })
    }
}

/// Cookie-jar file store.
#[derive(Debug)]
pub struct CookieFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl CookieFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Live cookies in file order. Expired and malformed lines are skipped.
    fn read_live(&self) -> Result<Vec<Cookie>, ChatdeskError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ChatdeskError::Storage { source: Box::new(e) }),
        };
        let now = Utc::now();
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let cookie = Cookie::parse(line);
                if cookie.is_none() {
                    debug!(path = %self.path.display(), "skipping malformed cookie line");
                }
                cookie
            })
            .filter(|cookie| cookie.expires > now)
            .collect())
    }

    fn write_all(&self, cookies: &[Cookie]) -> Result<(), ChatdeskError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ChatdeskError::Storage { source: Box::new(e) })?;
        }
        let mut content = cookies
            .iter()
            .map(Cookie::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&self.path, content).map_err(|e| ChatdeskError::Storage { source: Box::new(e) })
    }
}

impl KeyValueStore for CookieFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ChatdeskError> {
        let _guard = self.guard.lock().map_err(|_| poisoned("cookie jar"))?;
        Ok(self
            .read_live()?
            .into_iter()
            .rev()
            .find(|cookie| cookie.name == key)
            .map(|cookie| cookie.value))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ChatdeskError> {
        let _guard = self.guard.lock().map_err(|_| poisoned("cookie jar"))?;
        let mut cookies = self.read_live()?;
        cookies.retain(|cookie| cookie.name != key);
        cookies.push(Cookie {
            name: key.to_string(),
            value: value.to_string(),
            expires: expiry_after(ttl),
        });
        self.write_all(&cookies)
    }

    fn remove(&self, key: &str) -> Result<(), ChatdeskError> {
        let _guard = self.guard.lock().map_err(|_| poisoned("cookie jar"))?;
        let mut cookies = self.read_live()?;
        let before = cookies.len();
        cookies.retain(|cookie| cookie.name != key);
        if cookies.len() == before {
            return Ok(());
        }
        self.write_all(&cookies)
    }
}
