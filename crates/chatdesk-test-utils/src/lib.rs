// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chatdesk integration tests.
//!
//! Provides in-memory collaborators so the synchronizer can be exercised
//! without a network or a terminal.
//!
//! # Components
//!
//! - [`MockBackend`] - In-memory support service with call counters,
//!   failure injection and a delivery gate
//! - [`RecordingView`] - View that mirrors the rendered transcript and
//!   records every UI event
//! - [`fixtures`] - Canonical messages and uploads

pub mod fixtures;
pub mod mock_backend;
pub mod recording_view;

pub use mock_backend::{BackendOp, CallCounts, MockBackend};
pub use recording_view::{RecordingView, ViewEvent};
