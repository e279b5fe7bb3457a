// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete Chatdesk pipeline.
//!
//! Each test runs a wiremock upstream, a real relay on an ephemeral port and
//! a synchronizer talking to the relay through `RelayClient`.

use std::sync::Arc;
use std::time::Duration;

use chatdesk_chatwoot::RelayClient;
use chatdesk_core::types::MessageBody;
use chatdesk_gateway::{build_router, RelayGatewayConfig, RelayState};
use chatdesk_sync::{MemoryStore, Outcome, SyncSettings, Synchronizer};
use chatdesk_test_utils::fixtures::image_upload;
use chatdesk_test_utils::RecordingView;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INBOX: &str = "/public/api/v1/inboxes/inbox-1";

struct Stack {
    upstream: MockServer,
    sync: Synchronizer,
    view: Arc<RecordingView>,
}

async fn start_relay(upstream: &MockServer) -> String {
    let config = RelayGatewayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        base_url: upstream.uri(),
        account_id: Some("7".into()),
        api_access_token: Some(SecretString::from("relay-token")),
        max_upload_bytes: 1024 * 1024,
        allow_any_proxy_host: false,
        request_timeout: Duration::from_secs(5),
    };
    let app = build_router(RelayState::new(config).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn mount_session(upstream: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("{INBOX}/contacts")))
        .and(header("api_access_token", "relay-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "source_id": "src-1",
            "pubsub_token": "pub-1"
        })))
        .expect(1)
        .mount(upstream)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{INBOX}/contacts/src-1/conversations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 31 })))
        .expect(1)
        .mount(upstream)
        .await;
}

async fn stack() -> Stack {
    let upstream = MockServer::start().await;
    mount_session(&upstream).await;
    let relay_url = start_relay(&upstream).await;

    let backend = Arc::new(RelayClient::new(&relay_url, "inbox-1", Duration::from_secs(5)).unwrap());
    let view = Arc::new(RecordingView::new());
    let settings = SyncSettings {
        poll_interval: Duration::from_secs(600),
        ..SyncSettings::default()
    };
    let sync = Synchronizer::new(backend, Arc::new(MemoryStore::new()), view.clone(), settings);
    Stack {
        upstream,
        sync,
        view,
    }
}

#[tokio::test]
async fn send_through_relay_renders_reply() {
    let stack = stack().await;
    Mock::given(method("POST"))
        .and(path(format!("{INBOX}/contacts/src-1/conversations/31/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 100, "content": "hello", "message_type": 0, "created_at": 1_700_000_000
        })))
        .expect(1)
        .mount(&stack.upstream)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{INBOX}/contacts/src-1/conversations/31/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 101, "content": "How can I help?", "message_type": 1,
              "created_at": 1_700_000_005, "sender": { "type": "user", "name": "Ana" } },
            { "id": 100, "content": "hello", "message_type": 0, "created_at": 1_700_000_000 }
        ])))
        .mount(&stack.upstream)
        .await;

    stack.sync.start().await.unwrap();
    let outcome = stack.sync.send_message("  hello ").await;
    assert!(outcome.is_accepted(), "{outcome:?}");

    assert_eq!(stack.view.row_ids(), ["100", "101"]);
    let rows = stack.view.rows();
    assert_eq!(rows[1].author.as_deref(), Some("Ana"));
    assert_eq!(rows[1].body, MessageBody::Text("How can I help?".into()));
    assert!(!stack.sync.is_waiting());
    assert!(stack.view.input_enabled());
    assert!(!stack.view.typing_visible());
    stack.sync.shutdown();
}

#[tokio::test]
async fn upload_through_relay_replaces_placeholder() {
    let stack = stack().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/7/conversations/31/messages"))
        .and(header("api_access_token", "relay-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 102, "content": "the dialog", "message_type": 0, "created_at": 1_700_000_010,
            "attachments": [{ "file_type": "image", "data_url": "https://cdn.test/screenshot.png" }]
        })))
        .expect(1)
        .mount(&stack.upstream)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{INBOX}/contacts/src-1/conversations/31/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&stack.upstream)
        .await;

    stack.sync.start().await.unwrap();
    let outcome = stack.sync.upload_attachment(image_upload(Some("the dialog"))).await;
    match outcome {
        Outcome::Accepted(id) => assert_eq!(id.0, "102"),
        other => panic!("upload not accepted: {other:?}"),
    }

    assert_eq!(stack.view.row_ids(), ["102"]);
    assert_eq!(
        stack.view.rows()[0].body,
        MessageBody::Image {
            url: "https://cdn.test/screenshot.png".into(),
            caption: Some("the dialog".into()),
        }
    );
    assert!(stack.view.alerts().is_empty());
    stack.sync.shutdown();
}

#[tokio::test]
async fn upstream_rejection_surfaces_and_unlocks() {
    let stack = stack().await;
    Mock::given(method("POST"))
        .and(path(format!("{INBOX}/contacts/src-1/conversations/31/messages")))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "error": "closed" })))
        .mount(&stack.upstream)
        .await;

    stack.sync.start().await.unwrap();
    let outcome = stack.sync.send_message("anyone there?").await;
    match outcome {
        Outcome::Failed(e) => assert_eq!(e.http_status(), 422),
        other => panic!("send should fail: {other:?}"),
    }

    assert!(stack.view.row_ids().is_empty());
    assert_eq!(stack.view.alerts().len(), 1);
    assert!(stack.view.alerts()[0].starts_with("Failed to send message"));
    assert!(!stack.sync.is_waiting());
    assert!(stack.view.input_enabled());
    stack.sync.shutdown();
}
