// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session state machine.

use std::fmt;

/// Lifecycle of one relay connection.
///
/// `Disconnected → Connecting → Connected → Draining → Closed`. A session
/// never leaves `Closed`; reconnecting builds a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, `connect` not called yet.
    Disconnected,
    /// Transport open and identity exchange in progress.
    Connecting,
    /// Ready for downstream traffic.
    Connected,
    /// The relay asked us to stop sending; inbound traffic still flows.
    Draining,
    /// The transport is gone.
    Closed,
}

impl SessionState {
    /// Whether embedder-originated downstream messages may be sent.
    pub fn accepts_downstream(self) -> bool {
        self == SessionState::Connected
    }

    /// Whether protocol responses (acks) may be sent.
    pub fn accepts_protocol(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Draining)
    }

    /// Whether inbound envelopes are still dispatched.
    pub fn processes_inbound(self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Connected | SessionState::Draining
        )
    }

    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }

    /// Returns true if moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Disconnected, Closed)
                | (Connecting, Connected)
                | (Connecting, Closed)
                | (Connected, Draining)
                | (Connected, Closed)
                | (Draining, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
