// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatdesk chat` command implementation.
//!
//! Wires a backend (relay or direct), the cookie jar and a terminal view
//! into a [`Synchronizer`], subscribes to realtime pushes when enabled and
//! feeds readline input into sends and uploads.

use std::sync::Arc;
use std::time::Duration;

use chatdesk_chatwoot::{CableClient, PublicApiClient, RelayClient};
use chatdesk_config::model::WidgetMode;
use chatdesk_config::ChatdeskConfig;
use chatdesk_core::traits::SupportBackend;
use chatdesk_core::ChatdeskError;
use chatdesk_sync::{CookieFileStore, IgnoreReason, Outcome, SyncSettings, Synchronizer};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::terminal::{parse_input, read_upload, Input, TerminalView};

/// Picks the backend named by `widget.mode`.
pub fn build_backend(config: &ChatdeskConfig) -> Result<Arc<dyn SupportBackend>, ChatdeskError> {
    let inbox = config
        .upstream
        .inbox_identifier
        .as_deref()
        .ok_or_else(|| ChatdeskError::Config("upstream.inbox_identifier is required".into()))?;
    let timeout = Duration::from_secs(config.upstream.request_timeout_secs);

    let backend: Arc<dyn SupportBackend> = match config.widget.mode {
        WidgetMode::Relay => Arc::new(RelayClient::new(&config.widget.relay_url, inbox, timeout)?),
        WidgetMode::Direct => Arc::new(PublicApiClient::new(
            &config.upstream.base_url,
            inbox,
            timeout,
        )?),
    };
    Ok(backend)
}

/// Subscribes with the contact's pubsub token and applies pushes until the
/// channel drops.
fn spawn_realtime(sync: Synchronizer, cable: CableClient) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(contact) = sync.contact() else {
            return;
        };
        match cable.subscribe(&contact.pubsub_token).await {
            Ok(events) => sync.run_realtime(events).await,
            Err(e) => warn!(error = %e, "realtime unavailable, relying on polling"),
        }
    })
}

/// Reads lines on a dedicated thread so the runtime keeps rendering while
/// the prompt blocks.
fn spawn_reader() -> Result<mpsc::Receiver<String>, ChatdeskError> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| ChatdeskError::Internal(format!("failed to initialize readline: {e}")))?;
    let (tx, rx) = mpsc::channel(8);
    let prompt = format!("{}> ", "chatdesk".green());

    std::thread::spawn(move || loop {
        match editor.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(&line);
                }
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            // Ctrl+C or Ctrl+D
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    });
    Ok(rx)
}

fn report(outcome: Outcome) {
    match outcome {
        Outcome::Accepted(id) => debug!(%id, "delivered"),
        Outcome::Ignored(IgnoreReason::Busy) => {
            println!("{}", "still waiting on your previous message".dimmed());
        }
        Outcome::Ignored(IgnoreReason::Empty) => {}
        // Already surfaced through the view.
        Outcome::Failed(e) => debug!(error = %e, "delivery failed"),
    }
}

/// Runs the `chatdesk chat` terminal widget.
pub async fn run_chat(config: ChatdeskConfig) -> Result<(), ChatdeskError> {
    let backend = build_backend(&config)?;
    let store = Arc::new(CookieFileStore::new(&config.widget.cookie_jar));
    let view = Arc::new(TerminalView::new());
    let sync = Synchronizer::new(
        backend,
        store,
        view.clone(),
        SyncSettings::from_config(&config.widget),
    );

    println!("{}", "chatdesk chat".bold().green());
    println!(
        "Type {} to send a file, {} to exit.\n",
        "/attach <path> [caption]".yellow(),
        "/quit".yellow()
    );

    sync.start().await?;
    info!(mode = ?config.widget.mode, "chat session started");

    let realtime = config.widget.realtime.then(|| {
        let cable = CableClient::new(
            config.upstream.resolved_cable_url(),
            Duration::from_secs(config.upstream.request_timeout_secs),
        );
        spawn_realtime(sync.clone(), cable)
    });

    let mut lines = spawn_reader()?;
    while let Some(line) = lines.recv().await {
        let input = parse_input(&line);
        if !matches!(input, Input::Empty | Input::Quit) && !view.input_enabled() {
            if sync.is_connected() {
                println!("{}", "still waiting on your previous message".dimmed());
            } else {
                eprintln!("{}", "Connection error".red());
            }
            continue;
        }
        match input {
            Input::Empty => {}
            Input::Quit => break,
            Input::AttachUsage => eprintln!("usage: /attach <path> [caption]"),
            Input::Message(text) => {
                let sync = sync.clone();
                tokio::spawn(async move { report(sync.send_message(&text).await) });
            }
            Input::Attach { path, caption } => match read_upload(&path, caption).await {
                Ok(upload) => {
                    let sync = sync.clone();
                    tokio::spawn(async move { report(sync.upload_attachment(upload).await) });
                }
                Err(e) => eprintln!("{}: {e}", "error".red()),
            },
        }
    }

    if let Some(task) = realtime {
        task.abort();
    }
    sync.shutdown();
    println!("{}", "goodbye".dimmed());
    Ok(())
}
