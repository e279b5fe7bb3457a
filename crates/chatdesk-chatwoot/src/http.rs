// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response handling shared by the HTTP backends.

use std::time::Duration;

use chatdesk_core::ChatdeskError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Builds the pooled client every backend request goes through.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ChatdeskError> {
    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| ChatdeskError::transport(format!("failed to build HTTP client: {e}"), e))
}

/// Maps a send failure into a transport error.
pub(crate) fn send_error(e: reqwest::Error) -> ChatdeskError {
    ChatdeskError::transport(format!("HTTP request failed: {e}"), e)
}

/// Reads the body of a response, failing with [`ChatdeskError::Upstream`] on
/// a non-success status.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, ChatdeskError> {
    let status = response.status();
    let url = response.url().path().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| ChatdeskError::transport(format!("failed to read response body: {e}"), e))?;
    debug!(status = %status, path = %url, "upstream response received");

    if !status.is_success() {
        return Err(ChatdeskError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Reads and decodes a JSON response body.
pub(crate) async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ChatdeskError> {
    let body = read_body(response).await?;
    serde_json::from_str(&body)
        .map_err(|e| ChatdeskError::serialization(format!("failed to parse response: {e}"), e))
}

/// Builds the multipart file part for an upload.
pub(crate) fn file_part(
    upload: &chatdesk_core::AttachmentUpload,
) -> Result<reqwest::multipart::Part, ChatdeskError> {
    reqwest::multipart::Part::bytes(upload.data.clone())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.mime_type)
        .map_err(|e| {
            ChatdeskError::InvalidRequest(format!(
                "invalid MIME type '{}': {e}",
                upload.mime_type
            ))
        })
}
