// SPDX-FileCopyrightText: 2026 Chatdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typing-indicator timing.

use std::time::Duration;

use tokio::time::Instant;

/// How to arm the typing indicator for a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingPlan {
    /// Time until the indicator is shown.
    pub delay: Duration,
    /// Hide a visible indicator right away.
    pub hide_now: bool,
}

/// Timing knobs for [`plan_typing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingTimings {
    pub normal_delay: Duration,
    pub rapid_delay: Duration,
    pub rapid_window: Duration,
}

impl Default for TypingTimings {
    fn default() -> Self {
        Self {
            normal_delay: Duration::from_millis(3000),
            rapid_delay: Duration::from_millis(2000),
            rapid_window: Duration::from_millis(2000),
        }
    }
}

/// Sends closer together than `rapid_window` get the shorter delay and
/// reset the indicator.
pub fn plan_typing(
    previous_send: Option<Instant>,
    now: Instant,
    timings: &TypingTimings,
) -> TypingPlan {
    let rapid = previous_send
        .map(|previous| now.saturating_duration_since(previous) < timings.rapid_window)
        .unwrap_or(false);
    if rapid {
        TypingPlan {
            delay: timings.rapid_delay,
            hide_now: true,
        }
    } else {
        TypingPlan {
            delay: timings.normal_delay,
            hide_now: false,
        }
    }
}
