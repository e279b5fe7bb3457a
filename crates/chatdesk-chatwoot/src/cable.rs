// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ActionCable subscriber for realtime conversation events.
//!
//! [`CableClient::subscribe`] opens the socket, subscribes to the contact's
//! `RoomChannel` and yields [`CableEvent`]s until the server closes the
//! connection. The end of the stream means the connection was lost.

use std::pin::Pin;
use std::time::Duration;

use chatdesk_core::types::CableEvent;
use chatdesk_core::ChatdeskError;
use futures::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::types::WireMessage;

/// Stream of decoded cable frames.
pub type CableStream = Pin<Box<dyn Stream<Item = Result<CableEvent, ChatdeskError>> + Send>>;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Channel name the support service publishes conversation events on.
const CHANNEL: &str = "RoomChannel";

/// Event name of a newly created message.
const MESSAGE_CREATED: &str = "message.created";

/// Connects to an ActionCable endpoint.
#[derive(Debug, Clone)]
pub struct CableClient {
    url: String,
    connect_timeout: Duration,
}

impl CableClient {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    /// Opens the socket and subscribes with the contact's pubsub token.
    pub async fn subscribe(&self, pubsub_token: &str) -> Result<CableStream, ChatdeskError> {
        let (mut socket, _) = tokio::time::timeout(self.connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| ChatdeskError::Realtime(format!("timed out connecting to {}", self.url)))?
            .map_err(|e| ChatdeskError::Realtime(format!("failed to connect to {}: {e}", self.url)))?;

        socket
            .send(WsMessage::text(subscribe_command(pubsub_token)))
            .await
            .map_err(|e| ChatdeskError::Realtime(format!("failed to subscribe: {e}")))?;
        info!(url = %self.url, "realtime channel connected");

        Ok(Box::pin(frames(socket)))
    }
}

/// Turns the socket into a stream of events that ends on close or error.
fn frames(socket: Socket) -> impl Stream<Item = Result<CableEvent, ChatdeskError>> + Send {
    futures::stream::unfold(Some(socket), |state| async move {
        let mut socket = state?;
        loop {
            match socket.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return Some((parse_frame(text.as_str()), Some(socket)));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "realtime channel closed by server");
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "realtime channel failed");
                    return Some((Err(ChatdeskError::Realtime(e.to_string())), None));
                }
                None => return None,
            }
        }
    })
}

/// The subscribe command for a contact's room.
///
/// ActionCable expects `identifier` as a JSON document encoded into a string.
pub fn subscribe_command(pubsub_token: &str) -> String {
    let identifier = json!({ "channel": CHANNEL, "pubsub_token": pubsub_token }).to_string();
    json!({ "command": "subscribe", "identifier": identifier }).to_string()
}

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Broadcast {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Decodes one text frame.
///
/// Only `message.created` broadcasts of agent messages become
/// [`CableEvent::MessageCreated`]; visitor echoes arrive through the send
/// response and the next pull instead.
pub fn parse_frame(text: &str) -> Result<CableEvent, ChatdeskError> {
    let frame: Frame = serde_json::from_str(text)
        .map_err(|e| ChatdeskError::serialization(format!("invalid cable frame: {e}"), e))?;

    if let Some(kind) = frame.kind.as_deref() {
        return Ok(match kind {
            "welcome" => CableEvent::Welcome,
            "ping" => CableEvent::Ping,
            "confirm_subscription" => CableEvent::ConfirmSubscription,
            other => CableEvent::Other(other.to_string()),
        });
    }

    let Some(Value::Object(body)) = frame.message else {
        return Ok(CableEvent::Other("unknown".into()));
    };
    let broadcast: Broadcast = serde_json::from_value(Value::Object(body))
        .map_err(|e| ChatdeskError::serialization(format!("invalid broadcast: {e}"), e))?;
    let event = broadcast.event.unwrap_or_default();
    if event != MESSAGE_CREATED {
        return Ok(CableEvent::Other(event));
    }

    let Some(data) = broadcast.data else {
        return Ok(CableEvent::Other(event));
    };
    let wire: WireMessage = serde_json::from_value(data)
        .map_err(|e| ChatdeskError::serialization(format!("invalid message payload: {e}"), e))?;
    if wire.message_type.as_ref().is_some_and(|t| t.is_outgoing()) {
        Ok(CableEvent::MessageCreated(wire.into_message()))
    } else {
        Ok(CableEvent::Other(event))
    }
}
