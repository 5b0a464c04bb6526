// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reconnection Policy
//!
//! Decides what happens after a session's transport closes.

use super::backoff::Backoff;
use crate::config::ReconnectConfig;
use crate::session::{SessionError, SessionState};

/// What to do about a closed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// The drained connection ended as announced: open a fresh session now.
    Replace,
    /// The connection dropped unexpectedly: reconnect with backoff.
    Backoff,
    /// Nothing to do.
    Ignore,
}

/// Reconnection rules for a client.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        ReconnectPolicy { config }
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Decides how to react to a closure.
    ///
    /// `prior_state` is the state the session was in when the closure
    /// arrived; `is_current` is false for sessions that were already
    /// replaced.
    pub fn on_closed(
        &self,
        prior_state: SessionState,
        is_current: bool,
        shutting_down: bool,
    ) -> ReconnectDecision {
        if shutting_down || !is_current {
            return ReconnectDecision::Ignore;
        }
        match prior_state {
            SessionState::Draining => ReconnectDecision::Replace,
            SessionState::Connected => ReconnectDecision::Backoff,
            // Connect failures are reported by `connect` itself.
            SessionState::Disconnected | SessionState::Connecting | SessionState::Closed => {
                ReconnectDecision::Ignore
            }
        }
    }

    /// Whether to open the replacement session as soon as draining starts.
    pub fn preconnect_on_drain(&self, is_current: bool, shutting_down: bool) -> bool {
        self.config.preconnect_on_drain && is_current && !shutting_down
    }

    /// Whether a failed connect attempt is worth retrying.
    pub fn should_retry(&self, error: &SessionError) -> bool {
        !error.is_authentication()
    }

    /// A fresh backoff schedule.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(&self.config)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::new(ReconnectConfig::default())
    }
}
