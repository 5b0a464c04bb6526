// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Event System
//!
//! Callbacks for session and reconnection events.

use std::sync::Arc;
use std::time::Duration;

use crate::network::LifecycleEvent;
use crate::session::{guard_callback, SessionState};

/// Events emitted by sessions and the reconnect supervisor.
///
/// `generation` identifies the session that raised the event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A session moved to a new state.
    StateChanged {
        /// The session generation.
        generation: u64,
        /// The new state.
        state: SessionState,
    },

    /// The transport reported a lifecycle change.
    Lifecycle {
        /// The session generation.
        generation: u64,
        /// What the transport reported.
        event: LifecycleEvent,
    },

    /// The relay asked the session to drain.
    DrainingStarted {
        /// The session generation.
        generation: u64,
    },

    /// The session's transport closed.
    SessionClosed {
        /// The session generation.
        generation: u64,
        /// State the session was in when the closure arrived.
        prior_state: SessionState,
        /// Error reported by the transport, if any.
        error: Option<String>,
    },

    /// A reconnect attempt will start after `delay`.
    ReconnectScheduled {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Backoff delay before the attempt.
        delay: Duration,
    },

    /// A reconnect attempt failed and will be retried.
    ReconnectFailed {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Error description.
        error: String,
    },

    /// A new session is connected.
    Reconnected {
        /// Generation of the new session.
        generation: u64,
        /// Attempts it took.
        attempts: u32,
    },

    /// A drained session was replaced by a fresh one.
    SessionReplaced {
        /// Generation of the drained session.
        old_generation: u64,
        /// Generation of the replacement.
        new_generation: u64,
    },

    /// The relay rejected the credentials. Reconnecting stops.
    AuthenticationFailed {
        /// Error description.
        reason: String,
    },
}

/// Event handler trait.
///
/// Implement this trait to receive client events.
pub trait EventHandler: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: ClientEvent);
}

/// Simple callback-based event handler.
///
/// Wraps a closure for easy event handling.
pub struct CallbackHandler<F>
where
    F: Fn(ClientEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(ClientEvent) + Send + Sync,
{
    /// Creates a new callback handler.
    pub fn new(callback: F) -> Self {
        CallbackHandler { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(ClientEvent) + Send + Sync,
{
    fn on_event(&self, event: ClientEvent) {
        (self.callback)(event);
    }
}

/// Event dispatcher for managing multiple handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    pub fn new() -> Self {
        EventDispatcher {
            handlers: Vec::new(),
        }
    }

    /// Adds an event handler.
    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Removes all handlers.
    pub fn clear_handlers(&mut self) {
        self.handlers.clear();
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatches an event to all handlers.
    ///
    /// A panicking handler is logged and skipped; the rest still run.
    pub fn dispatch(&self, event: ClientEvent) {
        for handler in &self.handlers {
            let event = event.clone();
            guard_callback("event handler", move || handler.on_event(event));
        }
    }
}
