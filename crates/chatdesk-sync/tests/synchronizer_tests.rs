// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end behaviour of the synchronizer against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use chatdesk_config::model::LockReleaseMode;
use chatdesk_core::traits::KeyValueStore;
use chatdesk_core::types::{CableEvent, MessageBody, MessageStatus};
use chatdesk_core::ChatdeskError;
use chatdesk_sync::{
    IgnoreReason, MemoryStore, Merge, Outcome, SyncSettings, Synchronizer,
    CONTACT_IDENTIFIER_KEY, CONVERSATION_ID_KEY, PUBSUB_TOKEN_KEY,
};
use chatdesk_test_utils::fixtures::{agent_message, contact_message, file_upload, image_upload};
use chatdesk_test_utils::{BackendOp, CallCounts, MockBackend, RecordingView, ViewEvent};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

struct Harness {
    sync: Synchronizer,
    backend: Arc<MockBackend>,
    store: Arc<MemoryStore>,
    view: Arc<RecordingView>,
}

fn harness_with(settings: SyncSettings) -> Harness {
    let backend = Arc::new(MockBackend::new());
    let store = Arc::new(MemoryStore::new());
    let view = Arc::new(RecordingView::new());
    let sync = Synchronizer::new(backend.clone(), store.clone(), view.clone(), settings);
    Harness {
        sync,
        backend,
        store,
        view,
    }
}

fn harness() -> Harness {
    harness_with(SyncSettings::default())
}

fn persist_session(store: &MemoryStore, conversation: Option<&str>) {
    store.set(CONTACT_IDENTIFIER_KEY, "stored-contact", DAY).unwrap();
    store.set(PUBSUB_TOKEN_KEY, "stored-token", DAY).unwrap();
    if let Some(conversation) = conversation {
        store.set(CONVERSATION_ID_KEY, conversation, DAY).unwrap();
    }
}

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

// --- Contact and conversation lifecycle ---

#[tokio::test(start_paused = true)]
async fn persisted_contact_is_reused_without_network() {
    let h = harness();
    persist_session(&h.store, None);

    let contact = h.sync.ensure_contact().await.unwrap();
    let again = h.sync.ensure_contact().await.unwrap();

    assert_eq!(contact.identifier, "stored-contact");
    assert_eq!(contact.pubsub_token, "stored-token");
    assert_eq!(again, contact);
    assert_eq!(h.backend.calls().await.create_contact, 0);
}

#[tokio::test(start_paused = true)]
async fn partial_identity_creates_a_new_contact() {
    let h = harness();
    h.store.set(CONTACT_IDENTIFIER_KEY, "orphan", DAY).unwrap();

    let contact = h.sync.ensure_contact().await.unwrap();

    assert_ne!(contact.identifier, "orphan");
    assert_eq!(h.backend.calls().await.create_contact, 1);
    assert_eq!(
        h.store.get(CONTACT_IDENTIFIER_KEY).unwrap(),
        Some(contact.identifier.clone())
    );
    assert_eq!(
        h.store.get(PUBSUB_TOKEN_KEY).unwrap(),
        Some(contact.pubsub_token)
    );
    let names = h.backend.contact_names().await;
    assert!(names[0].starts_with("Visitor "), "got {names:?}");
}

#[tokio::test(start_paused = true)]
async fn conversation_is_created_once() {
    let h = harness();

    let (_, first) = h.sync.ensure_conversation().await.unwrap();
    let (_, second) = h.sync.ensure_conversation().await.unwrap();

    assert_eq!(first, second);
    let calls = h.backend.calls().await;
    assert_eq!(calls.create_contact, 1);
    assert_eq!(calls.create_conversation, 1);
    assert_eq!(h.store.get(CONVERSATION_ID_KEY).unwrap(), Some(first.0));
    assert!(h.sync.is_polling());
}

#[tokio::test(start_paused = true)]
async fn concurrent_setup_creates_one_conversation() {
    let h = harness();

    let (a, b) = tokio::join!(h.sync.ensure_conversation(), h.sync.ensure_conversation());

    assert_eq!(a.unwrap().1, b.unwrap().1);
    assert_eq!(h.backend.calls().await.create_conversation, 1);
}

#[tokio::test(start_paused = true)]
async fn start_resumes_persisted_conversation() {
    let h = harness();
    persist_session(&h.store, Some("conv-9"));
    h.backend
        .seed_conversation(
            "conv-9",
            vec![
                contact_message("1", "hello", 10),
                agent_message("2", "hi there", 20),
            ],
        )
        .await;

    h.sync.start().await.unwrap();

    assert_eq!(h.view.row_ids(), ["1", "2"]);
    assert!(h.sync.is_polling());
    assert!(h.view.input_enabled());
    assert_eq!(
        h.view.status().as_deref(),
        Some("Connected. Send a message:")
    );
    let calls = h.backend.calls().await;
    assert_eq!(calls.create_contact, 0);
    assert_eq!(calls.create_conversation, 0);
}

// --- Reconciliation ---

#[tokio::test(start_paused = true)]
async fn pull_fills_gaps_in_timestamp_order() {
    let h = harness();
    persist_session(&h.store, Some("conv-1"));
    h.sync.ensure_conversation().await.unwrap();
    h.sync.merge_and_render(Merge::Messages(vec![
        contact_message("1", "a", 10),
        contact_message("3", "c", 30),
    ]));
    h.backend
        .seed_conversation(
            "conv-1",
            vec![
                contact_message("1", "a", 10),
                contact_message("2", "b", 20),
                contact_message("3", "c", 30),
            ],
        )
        .await;

    let edits = h.sync.pull().await.unwrap();

    assert_eq!(edits, 1);
    assert_eq!(h.view.row_ids(), ["1", "2", "3"]);
    for id in ["1", "2", "3"] {
        assert_eq!(h.view.insert_count(id), 1, "message {id} rendered twice");
    }
}

#[tokio::test(start_paused = true)]
async fn pull_before_conversation_is_a_noop() {
    let h = harness();
    assert_eq!(h.sync.pull().await.unwrap(), 0);
    assert_eq!(h.backend.calls().await.list_messages, 0);
}

#[tokio::test(start_paused = true)]
async fn polling_picks_up_agent_replies() {
    let h = harness();
    let (_, conversation) = h.sync.ensure_conversation().await.unwrap();
    let reply = h.backend.push_agent_reply(&conversation.0, "hello").await;

    tokio::time::sleep(Duration::from_millis(2999)).await;
    assert!(h.view.row_ids().is_empty());

    tokio::time::sleep(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(h.view.row_ids(), [reply.id.0]);
}

// --- Sending ---

#[tokio::test(start_paused = true)]
async fn send_creates_session_and_renders_message() {
    let h = harness();

    let outcome = h.sync.send_message("  hello  ").await;

    let id = match outcome {
        Outcome::Accepted(id) => id,
        other => panic!("expected accepted, got {other:?}"),
    };
    let stored = h.backend.stored_messages(&h.sync.conversation().unwrap().0).await;
    assert_eq!(stored[0].content, "hello");
    assert_eq!(h.view.row_ids(), [id.0]);
    assert!(!h.sync.is_waiting());
    assert!(h.view.input_enabled());
    assert!(h.view.events().contains(&ViewEvent::ClearInput));

    let calls = h.backend.calls().await;
    assert_eq!(calls.send_message, 1);
    assert_eq!(calls.list_messages, 1);
}

#[tokio::test(start_paused = true)]
async fn blank_send_is_ignored() {
    let h = harness();
    let outcome = h.sync.send_message(" \n\t ").await;
    assert!(matches!(outcome, Outcome::Ignored(IgnoreReason::Empty)));
    assert_eq!(h.backend.calls().await, CallCounts::default());
}

#[tokio::test(start_paused = true)]
async fn second_send_while_locked_is_ignored() {
    let h = harness();
    h.sync.ensure_conversation().await.unwrap();
    h.backend.hold();

    let first = tokio::spawn({
        let sync = h.sync.clone();
        async move { sync.send_message("first").await }
    });
    settle().await;
    assert!(h.sync.is_waiting());
    assert!(!h.view.input_enabled());

    let second = h.sync.send_message("second").await;
    assert!(matches!(second, Outcome::Ignored(IgnoreReason::Busy)));

    h.backend.release();
    assert!(first.await.unwrap().is_accepted());
    assert_eq!(h.backend.calls().await.send_message, 1);
    assert_eq!(h.sync.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_send_releases_lock_and_alerts() {
    let h = harness();
    h.sync.ensure_conversation().await.unwrap();
    h.backend.fail_next(BackendOp::SendMessage, 500).await;

    let outcome = h.sync.send_message("hello").await;

    assert!(matches!(
        outcome,
        Outcome::Failed(ChatdeskError::Upstream { status: 500, .. })
    ));
    assert!(!h.sync.is_waiting());
    assert!(h.view.input_enabled());
    assert!(!h.sync.is_typing_armed());
    assert!(h.sync.messages().is_empty());
    assert_eq!(h.view.alerts().len(), 1);
    assert!(h.view.alerts()[0].starts_with("Failed to send message"));
}

#[tokio::test(start_paused = true)]
async fn contact_failure_aborts_the_send() {
    let h = harness();
    h.backend.fail_next(BackendOp::CreateContact, 503).await;

    let outcome = h.sync.send_message("hello").await;

    assert!(matches!(outcome, Outcome::Failed(_)));
    let calls = h.backend.calls().await;
    assert_eq!(calls.create_conversation, 0);
    assert_eq!(calls.send_message, 0);
    assert!(!h.sync.is_waiting());
}

// --- Typing indicator ---

#[tokio::test(start_paused = true)]
async fn typing_indicator_appears_after_normal_delay() {
    let h = harness();
    assert!(h.sync.send_message("hi").await.is_accepted());

    tokio::time::advance(Duration::from_millis(2999)).await;
    settle().await;
    assert!(!h.view.typing_visible());

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert!(h.view.typing_visible());
    assert!(h.sync.is_typing_visible());
}

#[tokio::test(start_paused = true)]
async fn rapid_second_send_uses_short_delay() {
    let h = harness();
    assert!(h.sync.send_message("one").await.is_accepted());
    tokio::time::advance(Duration::from_millis(1000)).await;
    assert!(h.sync.send_message("two").await.is_accepted());

    tokio::time::advance(Duration::from_millis(1999)).await;
    settle().await;
    assert!(!h.view.typing_visible());

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert!(h.view.typing_visible());
}

#[tokio::test(start_paused = true)]
async fn spaced_send_uses_normal_delay() {
    let h = harness();
    assert!(h.sync.send_message("one").await.is_accepted());
    let conversation = h.sync.conversation().unwrap();

    tokio::time::advance(Duration::from_millis(3000)).await;
    settle().await;
    assert!(h.view.typing_visible());
    h.backend.push_agent_reply(&conversation.0, "yes?").await;
    h.sync.pull().await.unwrap();
    assert!(!h.view.typing_visible());

    tokio::time::advance(Duration::from_millis(2000)).await;
    assert!(h.sync.send_message("two").await.is_accepted());

    tokio::time::advance(Duration::from_millis(2999)).await;
    settle().await;
    assert!(!h.view.typing_visible());

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert!(h.view.typing_visible());
}

// --- Lock release on reply ---

#[tokio::test(start_paused = true)]
async fn agent_reply_releases_lock_and_cancels_typing() {
    let h = harness_with(SyncSettings {
        lock_release: LockReleaseMode::OnReply,
        ..SyncSettings::default()
    });

    assert!(h.sync.send_message("anyone there?").await.is_accepted());
    assert!(h.sync.is_waiting());
    assert!(h.sync.is_typing_armed());
    assert!(!h.view.input_enabled());

    let conversation = h.sync.conversation().unwrap();
    h.backend.push_agent_reply(&conversation.0, "yes").await;
    h.sync.pull().await.unwrap();

    assert!(!h.sync.is_waiting());
    assert!(!h.sync.is_typing_armed());
    assert!(!h.view.typing_visible());
    assert!(h.view.input_enabled());

    tokio::time::advance(Duration::from_millis(5000)).await;
    settle().await;
    assert!(!h.view.typing_visible());
}

#[tokio::test(start_paused = true)]
async fn realtime_reply_releases_lock() {
    let h = harness_with(SyncSettings {
        lock_release: LockReleaseMode::OnReply,
        ..SyncSettings::default()
    });
    assert!(h.sync.send_message("hello").await.is_accepted());

    h.sync
        .apply_cable_event(CableEvent::MessageCreated(agent_message("900", "hi", 2_000_000_000)));

    assert!(!h.sync.is_waiting());
    assert_eq!(h.view.row_ids().last().map(String::as_str), Some("900"));
}

#[tokio::test(start_paused = true)]
async fn reply_releases_lock_behind_newer_failed_placeholder() {
    let h = harness_with(SyncSettings {
        lock_release: LockReleaseMode::OnReply,
        ..SyncSettings::default()
    });
    h.sync.ensure_conversation().await.unwrap();
    h.backend.fail_next(BackendOp::UploadAttachment, 413).await;
    assert!(matches!(
        h.sync.upload_attachment(file_upload()).await,
        Outcome::Failed(_)
    ));

    assert!(h.sync.send_message("retrying as text").await.is_accepted());
    assert!(h.sync.is_waiting());

    let conversation = h.sync.conversation().unwrap();
    h.backend.push_agent_reply(&conversation.0, "got it").await;
    h.sync.pull().await.unwrap();

    // The failed placeholder carries the local clock and still sorts last.
    let newest = h.sync.messages().last().cloned().unwrap();
    assert!(matches!(newest.status, MessageStatus::Error(_)));
    assert!(!h.sync.is_waiting());
    assert!(h.view.input_enabled());
}

// --- Attachments ---

#[tokio::test(start_paused = true)]
async fn upload_replaces_placeholder_in_place() {
    let h = harness();

    let outcome = h.sync.upload_attachment(image_upload(Some("look"))).await;

    let id = match outcome {
        Outcome::Accepted(id) => id,
        other => panic!("expected accepted, got {other:?}"),
    };
    let messages = h.sync.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, id);
    assert!(!messages[0].id.is_placeholder());
    assert_eq!(h.view.row_ids(), [id.0.clone()]);

    let events = h.view.events();
    let placeholder = events
        .iter()
        .find_map(|e| match e {
            ViewEvent::Insert { id, .. } if id.is_placeholder() => Some(id.clone()),
            _ => None,
        })
        .expect("placeholder rendered");
    assert!(events.contains(&ViewEvent::Replace {
        previous: placeholder,
        position: 0,
        id: id.clone(),
    }));
    assert!(matches!(
        &h.view.rows()[0].body,
        MessageBody::Image { caption: Some(c), .. } if c == "look"
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_upload_keeps_error_placeholder() {
    let h = harness();
    h.sync.ensure_conversation().await.unwrap();
    h.backend.fail_next(BackendOp::UploadAttachment, 413).await;

    let outcome = h.sync.upload_attachment(file_upload()).await;

    assert!(matches!(outcome, Outcome::Failed(_)));
    let messages = h.sync.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].id.is_placeholder());
    assert!(matches!(messages[0].status, MessageStatus::Error(_)));
    assert!(matches!(
        &h.view.rows()[0].body,
        MessageBody::UploadFailed { file_name, .. } if file_name == "invoice.pdf"
    ));
    assert!(!h.sync.is_waiting());
    assert!(h.view.input_enabled());
    assert_eq!(h.view.alerts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn upload_is_rejected_while_locked() {
    let h = harness();
    h.sync.ensure_conversation().await.unwrap();
    h.backend.hold();
    let pending = tokio::spawn({
        let sync = h.sync.clone();
        async move { sync.send_message("busy").await }
    });
    settle().await;

    let outcome = h.sync.upload_attachment(file_upload()).await;
    assert!(matches!(outcome, Outcome::Ignored(IgnoreReason::Busy)));
    assert!(h.view.row_ids().is_empty());

    h.backend.release();
    pending.await.unwrap();
}

// --- Realtime channel ---

#[tokio::test(start_paused = true)]
async fn realtime_stream_end_disables_input() {
    let h = harness();
    h.sync.ensure_conversation().await.unwrap();
    let events = futures::stream::iter(vec![
        Ok(CableEvent::Welcome),
        Ok(CableEvent::ConfirmSubscription),
        Ok(CableEvent::MessageCreated(agent_message("50", "hey", 50))),
        Err(ChatdeskError::Realtime("bad frame".into())),
        Ok(CableEvent::Other("conversation.typing_on".into())),
    ]);

    h.sync.run_realtime(events).await;

    assert_eq!(h.view.row_ids(), ["50"]);
    assert!(!h.sync.is_connected());
    assert!(!h.view.input_enabled());
    assert_eq!(h.view.status().as_deref(), Some("Connection error"));
}

#[tokio::test(start_paused = true)]
async fn pushed_duplicate_is_not_rendered_twice() {
    let h = harness();
    let message = agent_message("7", "once", 70);
    h.sync.apply_cable_event(CableEvent::MessageCreated(message.clone()));
    h.sync.apply_cable_event(CableEvent::MessageCreated(message));
    assert_eq!(h.view.insert_count("7"), 1);
}
