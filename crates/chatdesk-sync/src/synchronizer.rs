// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation synchronizer.
//!
//! A [`Synchronizer`] owns the visitor's contact, the single conversation,
//! the message log and the transient UI state (send lock, typing indicator,
//! connection). Sends, uploads, periodic pulls and realtime pushes all feed
//! [`Synchronizer::merge_and_render`], which is the only place the log and
//! the view change.
//!
//! State sits behind a `std::sync::Mutex` that is never held across an
//! `.await`. Timers are spawned tasks holding a `Weak` back-reference; they
//! are aborted when re-armed and when the synchronizer is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chatdesk_config::model::{LockReleaseMode, WidgetConfig};
use chatdesk_core::traits::{ConversationView, KeyValueStore, SupportBackend};
use chatdesk_core::types::{
    Attachment, AttachmentUpload, CableEvent, ContactIdentity, ConversationId, FileType, Message,
    MessageId, MessageStatus, RenderedMessage, Sender,
};
use chatdesk_core::ChatdeskError;
use chrono::Utc;
use futures::{Stream, StreamExt};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::log::MessageLog;
use crate::typing::{plan_typing, TypingTimings};

/// Storage key of the contact identifier.
pub const CONTACT_IDENTIFIER_KEY: &str = "contactIdentifier";
/// Storage key of the realtime pubsub token.
pub const PUBSUB_TOKEN_KEY: &str = "contactPubsubToken";
/// Storage key of the conversation id.
pub const CONVERSATION_ID_KEY: &str = "conversationId";

const STATUS_CONNECTED: &str = "Connected. Send a message:";
const STATUS_DISCONNECTED: &str = "Connection error";

/// Timing and policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub typing: TypingTimings,
    pub lock_release: LockReleaseMode,
    /// Lifetime of the persisted contact and conversation.
    pub session_ttl: Duration,
    pub visitor_name_prefix: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            typing: TypingTimings::default(),
            lock_release: LockReleaseMode::OnResponse,
            session_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            visitor_name_prefix: "Visitor".to_string(),
        }
    }
}

impl SyncSettings {
    pub fn from_config(widget: &WidgetConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(widget.poll_interval_ms),
            typing: TypingTimings {
                normal_delay: Duration::from_millis(widget.typing_delay_ms),
                rapid_delay: Duration::from_millis(widget.rapid_typing_delay_ms),
                rapid_window: Duration::from_millis(widget.rapid_send_window_ms),
            },
            lock_release: widget.lock_release,
            session_ttl: Duration::from_secs(widget.cookie_ttl_days * 24 * 60 * 60),
            visitor_name_prefix: widget.visitor_name_prefix.clone(),
        }
    }
}

/// Why a send or upload was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A previous send still holds the lock.
    Busy,
    /// Nothing to send after trimming.
    Empty,
}

/// Result of a user-initiated send or upload.
#[derive(Debug)]
pub enum Outcome {
    /// Delivered; carries the server id.
    Accepted(MessageId),
    Ignored(IgnoreReason),
    /// The request failed. The view has already been told.
    Failed(ChatdeskError),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }
}

/// An input to the reconciliation step.
#[derive(Debug, Clone)]
pub enum Merge {
    /// Server messages from a pull, a push or a send response.
    Messages(Vec<Message>),
    /// An optimistic upload placeholder.
    Placeholder(Message),
    /// The server confirmed a placeholder.
    Resolve {
        placeholder: MessageId,
        confirmed: Message,
    },
    /// The request behind a placeholder failed.
    Failed {
        placeholder: MessageId,
        reason: String,
    },
}

struct SyncState {
    contact: Option<ContactIdentity>,
    conversation: Option<ConversationId>,
    log: MessageLog,
    waiting_for_response: bool,
    /// A send or upload request has not returned yet.
    in_flight: bool,
    poll_task: Option<JoinHandle<()>>,
    typing_task: Option<JoinHandle<()>>,
    /// Bumped whenever the typing timer is armed or cancelled.
    typing_generation: u64,
    typing_visible: bool,
    last_sent_at: Option<Instant>,
    connected: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            contact: None,
            conversation: None,
            log: MessageLog::new(),
            waiting_for_response: false,
            in_flight: false,
            poll_task: None,
            typing_task: None,
            typing_generation: 0,
            typing_visible: false,
            last_sent_at: None,
            connected: true,
        }
    }
}

struct Inner {
    backend: Arc<dyn SupportBackend>,
    store: Arc<dyn KeyValueStore>,
    view: Arc<dyn ConversationView>,
    settings: SyncSettings,
    state: Mutex<SyncState>,
    /// Serializes contact and conversation creation.
    setup: tokio::sync::Mutex<()>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hide_typing(&self, state: &mut SyncState) {
        state.typing_generation += 1;
        if let Some(task) = state.typing_task.take() {
            task.abort();
        }
        if state.typing_visible {
            state.typing_visible = false;
            self.view.set_typing(false);
        }
    }

    fn release_lock(&self, state: &mut SyncState) {
        if state.waiting_for_response {
            state.waiting_for_response = false;
            self.view.set_input_enabled(state.connected);
        }
    }

    fn stored(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "failed to read session storage");
                None
            }
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value, self.settings.session_ttl) {
            warn!(key, error = %e, "failed to persist session value");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = state.poll_task.take() {
            task.abort();
        }
        if let Some(task) = state.typing_task.take() {
            task.abort();
        }
    }
}

/// Shared handle to one visitor session.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

impl Synchronizer {
    pub fn new(
        backend: Arc<dyn SupportBackend>,
        store: Arc<dyn KeyValueStore>,
        view: Arc<dyn ConversationView>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                view,
                settings,
                state: Mutex::new(SyncState::default()),
                setup: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.inner.state()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn contact(&self) -> Option<ContactIdentity> {
        self.state().contact.clone()
    }

    pub fn conversation(&self) -> Option<ConversationId> {
        self.state().conversation.clone()
    }

    /// Whether the send lock is held.
    pub fn is_waiting(&self) -> bool {
        self.state().waiting_for_response
    }

    pub fn is_typing_visible(&self) -> bool {
        self.state().typing_visible
    }

    pub fn is_typing_armed(&self) -> bool {
        self.state().typing_task.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.state().poll_task.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Snapshot of the ordered log.
    pub fn messages(&self) -> Vec<Message> {
        self.state().log.messages().to_vec()
    }

    /// Full projection of the ordered log.
    pub fn render(&self) -> Vec<RenderedMessage> {
        self.state().log.render()
    }

    /// Restores or creates the contact, and resumes a persisted conversation
    /// with an initial pull.
    pub async fn start(&self) -> Result<(), ChatdeskError> {
        self.ensure_contact().await?;
        if self.inner.stored(CONVERSATION_ID_KEY).is_some() {
            self.ensure_conversation().await?;
            self.pull().await?;
        }
        let connected = self.state().connected;
        if connected {
            self.inner.view.show_status(STATUS_CONNECTED);
            self.inner.view.set_input_enabled(true);
        }
        Ok(())
    }

    /// Returns the contact, creating one only when neither memory nor
    /// storage holds a complete identity.
    pub async fn ensure_contact(&self) -> Result<ContactIdentity, ChatdeskError> {
        let _setup = self.inner.setup.lock().await;
        self.ensure_contact_locked().await
    }

    async fn ensure_contact_locked(&self) -> Result<ContactIdentity, ChatdeskError> {
        if let Some(contact) = self.state().contact.clone() {
            return Ok(contact);
        }

        let stored = self
            .inner
            .stored(CONTACT_IDENTIFIER_KEY)
            .zip(self.inner.stored(PUBSUB_TOKEN_KEY));
        if let Some((identifier, pubsub_token)) = stored {
            debug!(contact = %identifier, "restored contact from storage");
            let contact = ContactIdentity {
                identifier,
                pubsub_token,
            };
            self.state().contact = Some(contact.clone());
            return Ok(contact);
        }

        let suffix: u16 = rand::thread_rng().gen_range(0..1000);
        let name = format!("{} {suffix}", self.inner.settings.visitor_name_prefix);
        let contact = self.inner.backend.create_contact(&name).await?;
        info!(contact = %contact.identifier, %name, "contact created");
        self.inner.persist(CONTACT_IDENTIFIER_KEY, &contact.identifier);
        self.inner.persist(PUBSUB_TOKEN_KEY, &contact.pubsub_token);
        self.state().contact = Some(contact.clone());
        Ok(contact)
    }

    /// Returns the conversation, creating it at most once per session.
    ///
    /// Creating a conversation (re)starts the polling timer. A conversation
    /// restored from storage starts it only if it is not running yet.
    pub async fn ensure_conversation(
        &self,
    ) -> Result<(ContactIdentity, ConversationId), ChatdeskError> {
        let _setup = self.inner.setup.lock().await;
        let contact = self.ensure_contact_locked().await?;

        if let Some(conversation) = self.state().conversation.clone() {
            return Ok((contact, conversation));
        }

        if let Some(id) = self.inner.stored(CONVERSATION_ID_KEY) {
            debug!(conversation = %id, "restored conversation from storage");
            let conversation = ConversationId(id);
            let polling = {
                let mut state = self.state();
                state.conversation = Some(conversation.clone());
                state.poll_task.is_some()
            };
            if !polling {
                self.restart_polling();
            }
            return Ok((contact, conversation));
        }

        let conversation = self.inner.backend.create_conversation(&contact).await?;
        info!(conversation = %conversation, "conversation created");
        self.inner.persist(CONVERSATION_ID_KEY, &conversation.0);
        self.state().conversation = Some(conversation.clone());
        self.restart_polling();
        Ok((contact, conversation))
    }

    /// Sends a text message.
    ///
    /// Ignored when the trimmed content is empty or the lock is held.
    pub async fn send_message(&self, content: &str) -> Outcome {
        let content = content.trim();
        if content.is_empty() {
            return Outcome::Ignored(IgnoreReason::Empty);
        }
        if !self.try_lock() {
            debug!("send ignored while waiting for a response");
            return Outcome::Ignored(IgnoreReason::Busy);
        }
        self.inner.view.clear_input();
        self.arm_typing();

        let delivered = async {
            let (contact, conversation) = self.ensure_conversation().await?;
            self.inner
                .backend
                .send_message(&contact, &conversation, content)
                .await
        }
        .await;

        match delivered {
            Ok(message) => {
                let id = message.id.clone();
                self.merge_and_render(Merge::Messages(vec![message]));
                self.complete_request();
                self.pull_after_delivery().await;
                Outcome::Accepted(id)
            }
            Err(e) => {
                warn!(error = %e, "failed to send message");
                self.fail_request(&format!("Failed to send message: {e}"));
                Outcome::Failed(e)
            }
        }
    }

    /// Uploads one attachment behind a pending placeholder.
    ///
    /// On failure the placeholder stays in the transcript with an error
    /// status.
    pub async fn upload_attachment(&self, upload: AttachmentUpload) -> Outcome {
        if !self.try_lock() {
            debug!(file = %upload.file_name, "upload ignored while waiting for a response");
            return Outcome::Ignored(IgnoreReason::Busy);
        }

        let placeholder_id = MessageId::placeholder();
        let placeholder = Message {
            id: placeholder_id.clone(),
            content: upload.caption.clone().unwrap_or_default(),
            sender: Sender::contact(),
            created_at: Some(Utc::now()),
            attachments: vec![Attachment {
                file_type: FileType::from_mime(&upload.mime_type),
                file_name: upload.file_name.clone(),
                data_url: String::new(),
            }],
            status: MessageStatus::Pending,
        };
        self.merge_and_render(Merge::Placeholder(placeholder));
        if upload.caption.is_some() {
            self.inner.view.clear_input();
        }

        let delivered = async {
            let (contact, conversation) = self.ensure_conversation().await?;
            self.inner
                .backend
                .upload_attachment(&contact, &conversation, upload)
                .await
        }
        .await;

        match delivered {
            Ok(message) => {
                let id = message.id.clone();
                self.merge_and_render(Merge::Resolve {
                    placeholder: placeholder_id,
                    confirmed: message,
                });
                self.complete_request();
                self.pull_after_delivery().await;
                Outcome::Accepted(id)
            }
            Err(e) => {
                warn!(error = %e, "failed to upload attachment");
                self.merge_and_render(Merge::Failed {
                    placeholder: placeholder_id,
                    reason: e.to_string(),
                });
                self.fail_request(&format!("Failed to upload file: {e}"));
                Outcome::Failed(e)
            }
        }
    }

    /// Fetches the whole conversation and renders what is new.
    ///
    /// Returns the number of view edits. Does nothing before a conversation
    /// exists.
    pub async fn pull(&self) -> Result<usize, ChatdeskError> {
        let scope = {
            let state = self.state();
            state.contact.clone().zip(state.conversation.clone())
        };
        let Some((contact, conversation)) = scope else {
            return Ok(0);
        };
        let messages = self
            .inner
            .backend
            .list_messages(&contact, &conversation)
            .await?;
        trace!(count = messages.len(), "pulled messages");
        Ok(self.merge_and_render(Merge::Messages(messages)))
    }

    /// Applies one realtime frame.
    pub fn apply_cable_event(&self, event: CableEvent) {
        match event {
            CableEvent::MessageCreated(message) => {
                debug!(id = %message.id, "realtime message");
                self.merge_and_render(Merge::Messages(vec![message]));
            }
            CableEvent::Welcome | CableEvent::Ping | CableEvent::ConfirmSubscription => {
                trace!("cable control frame");
            }
            CableEvent::Other(kind) => debug!(%kind, "ignoring cable event"),
        }
    }

    /// Consumes a realtime stream until it ends, then marks the session
    /// disconnected and disables input.
    pub async fn run_realtime<S>(&self, mut events: S)
    where
        S: Stream<Item = Result<CableEvent, ChatdeskError>> + Unpin,
    {
        self.set_connected(true);
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => self.apply_cable_event(event),
                Err(e) => warn!(error = %e, "discarding realtime frame"),
            }
        }
        warn!("realtime channel lost");
        self.set_connected(false);
    }

    /// Reconciles the log with `merge` and pushes the resulting edits to the
    /// view. Returns the number of edits.
    ///
    /// When a server batch leaves an agent message as the newest confirmed
    /// one and no request is in flight, the agent has replied: the typing
    /// indicator is hidden and the send lock released.
    pub fn merge_and_render(&self, merge: Merge) -> usize {
        let mut state = self.state();
        let reply_candidate = matches!(merge, Merge::Messages(_));
        let ops = match merge {
            Merge::Messages(messages) => state.log.merge(messages),
            Merge::Placeholder(message) => state.log.merge([message]),
            Merge::Resolve {
                placeholder,
                confirmed,
            } => state.log.resolve_placeholder(&placeholder, confirmed),
            Merge::Failed {
                placeholder,
                reason,
            } => state.log.mark_failed(&placeholder, &reason),
        };
        for op in &ops {
            op.apply(self.inner.view.as_ref());
        }

        let replied = reply_candidate
            && !state.in_flight
            && state.log.latest_confirmed().is_some_and(|m| !m.is_outgoing());
        if replied {
            self.inner.hide_typing(&mut state);
            self.inner.release_lock(&mut state);
        }
        ops.len()
    }

    /// Cancels both timers.
    pub fn shutdown(&self) {
        let mut state = self.state();
        if let Some(task) = state.poll_task.take() {
            task.abort();
        }
        self.inner.hide_typing(&mut state);
    }

    fn try_lock(&self) -> bool {
        let mut state = self.state();
        if state.waiting_for_response {
            return false;
        }
        state.waiting_for_response = true;
        state.in_flight = true;
        self.inner.view.set_input_enabled(false);
        true
    }

    fn complete_request(&self) {
        let mut state = self.state();
        state.in_flight = false;
        if self.inner.settings.lock_release == LockReleaseMode::OnResponse {
            self.inner.release_lock(&mut state);
        }
    }

    fn fail_request(&self, alert: &str) {
        {
            let mut state = self.state();
            state.in_flight = false;
            self.inner.hide_typing(&mut state);
            self.inner.release_lock(&mut state);
        }
        self.inner.view.alert(alert);
    }

    async fn pull_after_delivery(&self) {
        if let Err(e) = self.pull().await {
            warn!(error = %e, "pull after delivery failed");
        }
    }

    fn set_connected(&self, connected: bool) {
        let mut state = self.state();
        state.connected = connected;
        if connected {
            self.inner.view.show_status(STATUS_CONNECTED);
            self.inner.view.set_input_enabled(!state.waiting_for_response);
        } else {
            self.inner.view.show_status(STATUS_DISCONNECTED);
            self.inner.view.set_input_enabled(false);
        }
    }

    /// Arms the typing timer for a send, replacing any armed one.
    fn arm_typing(&self) {
        let now = Instant::now();
        let mut state = self.state();
        let plan = plan_typing(state.last_sent_at, now, &self.inner.settings.typing);
        state.last_sent_at = Some(now);

        if plan.hide_now {
            self.inner.hide_typing(&mut state);
        } else if let Some(task) = state.typing_task.take() {
            task.abort();
        }
        state.typing_generation += 1;
        let generation = state.typing_generation;
        let weak = Arc::downgrade(&self.inner);
        state.typing_task = Some(tokio::spawn(show_typing_after(weak, plan.delay, generation)));
    }

    /// Replaces the polling task.
    fn restart_polling(&self) {
        let period = self.inner.settings.poll_interval;
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(poll_loop(weak, period));
        if let Some(previous) = self.state().poll_task.replace(task) {
            previous.abort();
        }
        debug!(period_ms = period.as_millis() as u64, "polling started");
    }
}

async fn show_typing_after(inner: Weak<Inner>, delay: Duration, generation: u64) {
    tokio::time::sleep(delay).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut state = inner.state();
    if state.typing_generation != generation {
        return;
    }
    state.typing_task = None;
    if !state.typing_visible {
        state.typing_visible = true;
        inner.view.set_typing(true);
    }
}

async fn poll_loop(inner: Weak<Inner>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let sync = Synchronizer { inner };
        if let Err(e) = sync.pull().await {
            warn!(error = %e, "poll failed");
        }
    }
}
