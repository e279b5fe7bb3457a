// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! POST /api/upload
//!
//! Accepts `attachment`, `conversationId` and an optional `content` field,
//! stages the file in an anonymous temporary file and re-posts it to the
//! account messages endpoint as an incoming message. The temporary file is
//! unlinked at creation, so it disappears once the request finishes.

use std::io::SeekFrom;

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatdesk_chatwoot::account_messages_url;
use chatdesk_core::ChatdeskError;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::handlers::{ApiError, ACCESS_TOKEN_HEADER};
use crate::server::RelayState;

const DEFAULT_FILE_NAME: &str = "upload";
const DEFAULT_MIME: &str = "application/octet-stream";

/// An attachment written to disk, rewound and ready to stream upstream.
struct StagedFile {
    file: tokio::fs::File,
    size: u64,
    file_name: String,
    mime_type: String,
}

impl StagedFile {
    fn into_part(self) -> Result<Part, ChatdeskError> {
        let body = reqwest::Body::wrap_stream(ReaderStream::new(self.file));
        Part::stream_with_length(body, self.size)
            .file_name(self.file_name)
            .mime_str(&self.mime_type)
            .map_err(|e| ChatdeskError::InvalidRequest(format!("invalid attachment type: {e}")))
    }
}

#[derive(Default)]
struct UploadForm {
    attachment: Option<StagedFile>,
    conversation_id: Option<String>,
    content: Option<String>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}

fn staging_error(err: std::io::Error) -> ChatdeskError {
    ChatdeskError::Internal(format!("failed to stage upload: {err}"))
}

/// Byte allowance shared by every field of one upload form.
struct FormBudget {
    used: u64,
    limit: u64,
}

impl FormBudget {
    fn new(limit: u64) -> Self {
        Self { used: 0, limit }
    }

    fn charge(&mut self, bytes: usize) -> Result<(), ApiError> {
        self.used += bytes as u64;
        if self.used > self.limit {
            return Err(ChatdeskError::PayloadTooLarge {
                size: self.used,
                limit: self.limit,
            }
            .into());
        }
        Ok(())
    }
}

/// Streams one file field to a temporary file, failing once the form's
/// budget is spent.
async fn stage(mut field: Field<'_>, budget: &mut FormBudget) -> Result<StagedFile, ApiError> {
    let file_name = field
        .file_name()
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();
    let mime_type = field.content_type().unwrap_or(DEFAULT_MIME).to_string();

    let mut file = tokio::fs::File::from_std(tempfile::tempfile().map_err(staging_error)?);
    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        budget.charge(chunk.len())?;
        size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(staging_error)?;
    }
    file.flush().await.map_err(staging_error)?;
    file.seek(SeekFrom::Start(0)).await.map_err(staging_error)?;

    Ok(StagedFile {
        file,
        size,
        file_name,
        mime_type,
    })
}

/// Reads a text field chunk by chunk against the form's budget.
async fn read_text(mut field: Field<'_>, budget: &mut FormBudget) -> Result<String, ApiError> {
    let name = field.name().unwrap_or_default().to_string();
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        budget.charge(chunk.len())?;
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes).map_err(|_| {
        ApiError::from(ChatdeskError::InvalidRequest(format!(
            "field {name} is not valid UTF-8"
        )))
    })
}

/// Drains a field the relay does not forward, still counting its bytes.
async fn skip(mut field: Field<'_>, budget: &mut FormBudget) -> Result<(), ApiError> {
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        budget.charge(chunk.len())?;
    }
    Ok(())
}

async fn read_form(multipart: &mut Multipart, limit: u64) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    let mut budget = FormBudget::new(limit);
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "attachment" => form.attachment = Some(stage(field, &mut budget).await?),
            "conversationId" => form.conversation_id = Some(read_text(field, &mut budget).await?),
            "content" => form.content = Some(read_text(field, &mut budget).await?),
            _ => skip(field, &mut budget).await?,
        }
    }
    Ok(form)
}

/// Extracts the upstream's `message` from a failed answer.
fn upstream_message(status: StatusCode, body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("upstream rejected the upload ({status})"))
}

fn upload_failed(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
}

pub async fn post_upload(
    State(state): State<RelayState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let config = &state.config;
    let (token, account_id) = match (&config.api_access_token, config.account_id.as_deref()) {
        (Some(token), Some(account)) if !account.is_empty() && !config.base_url.is_empty() => {
            (token, account)
        }
        _ => {
            return Err(ChatdeskError::Config(
                "relay upload requires upstream base_url, account_id and api_access_token".into(),
            )
            .into());
        }
    };

    let mut multipart =
        multipart.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
    let form = read_form(&mut multipart, config.max_upload_bytes).await?;
    let (Some(conversation_id), Some(attachment)) = (
        form.conversation_id.filter(|id| !id.trim().is_empty()),
        form.attachment,
    ) else {
        return Err(ChatdeskError::InvalidRequest(
            "conversationId and attachment are required".into(),
        )
        .into());
    };

    let size = attachment.size;
    let upstream_form = Form::new()
        .text("content", form.content.unwrap_or_default())
        .text("message_type", "incoming")
        .part("attachments[]", attachment.into_part()?);
    let url = account_messages_url(&config.base_url, account_id, &conversation_id);

    let response = state
        .http
        .post(&url)
        .header(ACCESS_TOKEN_HEADER, token.expose_secret())
        .bearer_auth(token.expose_secret())
        .multipart(upstream_form)
        .send()
        .await
        .map_err(|e| {
            warn!(error = %e, conversation = %conversation_id, "upload forwarding failed");
            upload_failed(format!("upload forwarding failed: {e}"))
        })?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| upload_failed(format!("failed to read upstream answer: {e}")))?;
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    if !status.is_success() {
        let message = upstream_message(status, &body);
        warn!(%status, conversation = %conversation_id, %message, "upstream rejected upload");
        return Err(upload_failed(message));
    }
    if body.is_null() {
        return Err(upload_failed("upstream answered the upload with invalid JSON"));
    }

    info!(conversation = %conversation_id, size, "attachment forwarded");
    Ok(Json(json!({ "success": true, "data": body })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_shared_across_charges() {
        let mut budget = FormBudget::new(10);
        assert!(budget.charge(6).is_ok());
        assert!(budget.charge(4).is_ok());
        let err = budget.charge(1).unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn upstream_message_prefers_body_message() {
        let body = json!({ "message": "File type not supported" });
        assert_eq!(
            upstream_message(StatusCode::UNPROCESSABLE_ENTITY, &body),
            "File type not supported"
        );
        assert_eq!(
            upstream_message(StatusCode::BAD_GATEWAY, &Value::Null),
            "upstream rejected the upload (502 Bad Gateway)"
        );
    }
}
