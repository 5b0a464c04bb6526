// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session
//!
//! Owns one transport connection and mediates all sends and receives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::dispatcher::{DispatchOutcome, Dispatcher, ProtocolSink};
use super::error::SessionError;
use super::handler::Handlers;
use super::state::SessionState;
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::envelope::{self, AckMessage, DownstreamMessage, MessageId};
use crate::events::{ClientEvent, EventDispatcher};
use crate::network::{LifecycleEvent, NetworkError, Transport, TransportListener};

/// One logical connection to the relay.
///
/// Wraps a transport and adds:
/// - The session state machine, including draining
/// - Envelope encoding for downstream sends
/// - Decoding and dispatch of inbound envelopes
///
/// Cloning yields another handle to the same session.
///
/// # Example
///
/// ```ignore
/// use pushlink_core::{ClientConfig, Credentials, Handlers, MockTransport, Session};
///
/// let session = Session::new(MockTransport::new(), ClientConfig::default(),
///     Handlers::default(), Arc::new(EventDispatcher::new()));
/// session.connect(&Credentials::new(1234, "api-key"))?;
///
/// let msg = DownstreamMessage::builder("device-token", session.next_message_id())
///     .data("MESSAGE", "hello")
///     .build()?;
/// session.send_downstream(&msg)?;
/// ```
pub struct Session<T: Transport + 'static> {
    inner: Arc<SessionInner<T>>,
}

impl<T: Transport + 'static> Clone for Session<T> {
    fn clone(&self) -> Self {
        Session {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner<T: Transport> {
    generation: u64,
    transport: T,
    config: ClientConfig,
    // Held for reading across every transport write so a drain transition
    // (write lock) cannot interleave with a send.
    state: RwLock<SessionState>,
    // A drain signal that arrived before the handshake finished. Only
    // touched with the state write lock held.
    drain_pending: AtomicBool,
    dispatcher: Dispatcher,
    events: Arc<EventDispatcher>,
}

impl<T: Transport + 'static> Session<T> {
    /// Creates a disconnected session.
    pub fn new(
        transport: T,
        config: ClientConfig,
        handlers: Handlers,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self::with_generation(transport, config, handlers, events, 0)
    }

    pub(crate) fn with_generation(
        transport: T,
        config: ClientConfig,
        handlers: Handlers,
        events: Arc<EventDispatcher>,
        generation: u64,
    ) -> Self {
        let dispatcher = Dispatcher::new(handlers, config.handler_execution, config.ack_policy)
            .with_handler_limit(config.max_spawned_handlers);
        Session {
            inner: Arc::new(SessionInner {
                generation,
                transport,
                config,
                state: RwLock::new(SessionState::Disconnected),
                drain_pending: AtomicBool::new(false),
                dispatcher,
                events,
            }),
        }
    }

    /// Identifies this session among those created by one client.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn is_draining(&self) -> bool {
        self.state() == SessionState::Draining
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Opens the transport and performs the identity exchange.
    ///
    /// Registers the session's listener first, so no lifecycle event or
    /// inbound envelope is missed. A drain signal received during the
    /// handshake is honored: the session comes up `Draining`. A failed
    /// connect leaves the session `Closed`.
    pub fn connect(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let inner = &self.inner;
        inner.transition(SessionState::Disconnected, SessionState::Connecting)?;

        let listener = Arc::new(SessionListener {
            session: Arc::downgrade(inner),
        });
        inner.transport.set_listener(listener);

        let login = credentials.login(&inner.config.realm);
        info!(
            generation = inner.generation,
            endpoint = %inner.config.transport.endpoint(),
            address = login.address(),
            "Connecting to relay"
        );

        match inner.transport.open(&inner.config.transport, &login) {
            Ok(()) => {
                if inner.finish_handshake().is_err() {
                    warn!(generation = inner.generation, "Connection closed during handshake");
                    return Err(SessionError::Connect(NetworkError::ConnectionClosed));
                }
                info!(generation = inner.generation, "Session connected");
                Ok(())
            }
            Err(error) => {
                inner.mark_closed();
                warn!(generation = inner.generation, error = %error, "Connect failed");
                Err(match error {
                    NetworkError::AuthenticationFailed(reason) => {
                        SessionError::Authentication(reason)
                    }
                    other => SessionError::Connect(other),
                })
            }
        }
    }

    /// Sends a downstream message.
    ///
    /// Rejected without touching the transport unless the session is
    /// `Connected`. `SessionError::NotConnected` is the one retryable
    /// failure.
    pub fn send_downstream(&self, message: &DownstreamMessage) -> Result<(), SessionError> {
        let text = envelope::encode(message)?;

        let state = self.inner.state.read();
        match *state {
            SessionState::Connected => {}
            SessionState::Draining => {
                info!(
                    message_id = message.message_id(),
                    "Dropping downstream message since the connection is draining"
                );
                return Err(SessionError::RejectedDraining);
            }
            _ => return Err(SessionError::NotConnected),
        }

        self.inner.transport.send(&text).map_err(send_error)?;
        debug!(
            generation = self.inner.generation,
            message_id = message.message_id(),
            to = message.to(),
            "Downstream message sent"
        );
        Ok(())
    }

    /// Returns a fresh message identifier.
    pub fn next_message_id(&self) -> MessageId {
        envelope::next_message_id()
    }

    /// Processes one inbound envelope.
    ///
    /// This is what the transport listener calls. Malformed envelopes and
    /// envelopes arriving after the session closed are logged and dropped
    /// (`None`).
    pub fn receive(&self, text: &str) -> Option<DispatchOutcome> {
        self.inner.receive(text)
    }

    /// Tears down the transport. The session ends `Closed`.
    pub fn close(&self) -> Result<(), SessionError> {
        self.inner.mark_closed();
        self.inner
            .transport
            .close()
            .map_err(SessionError::Transport)
    }
}

impl<T: Transport + 'static> SessionInner<T> {
    fn state(&self) -> SessionState {
        *self.state.read()
    }

    fn emit(&self, event: ClientEvent) {
        self.events.dispatch(event);
    }

    fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionError> {
        {
            let mut state = self.state.write();
            if *state != from || !from.can_transition_to(to) {
                return Err(SessionError::InvalidState(*state));
            }
            *state = to;
        }
        self.emit(ClientEvent::StateChanged {
            generation: self.generation,
            state: to,
        });
        Ok(())
    }

    /// Leaves `Connecting`. Goes straight on to `Draining`, under the same
    /// write lock, when a drain signal arrived during the handshake.
    fn finish_handshake(&self) -> Result<(), SessionError> {
        let drain = {
            let mut state = self.state.write();
            if *state != SessionState::Connecting {
                return Err(SessionError::InvalidState(*state));
            }
            let drain = self.drain_pending.swap(false, Ordering::AcqRel);
            *state = if drain {
                SessionState::Draining
            } else {
                SessionState::Connected
            };
            drain
        };

        self.emit(ClientEvent::StateChanged {
            generation: self.generation,
            state: SessionState::Connected,
        });
        if drain {
            self.announce_draining();
        }
        Ok(())
    }

    fn announce_draining(&self) {
        info!(generation = self.generation, "Relay requested connection draining");
        self.emit(ClientEvent::StateChanged {
            generation: self.generation,
            state: SessionState::Draining,
        });
        self.emit(ClientEvent::DrainingStarted {
            generation: self.generation,
        });
    }

    /// Moves to `Closed`, returning the previous state.
    fn mark_closed(&self) -> SessionState {
        let prior = std::mem::replace(&mut *self.state.write(), SessionState::Closed);
        if prior != SessionState::Closed {
            self.emit(ClientEvent::StateChanged {
                generation: self.generation,
                state: SessionState::Closed,
            });
        }
        prior
    }

    fn receive(self: &Arc<Self>, text: &str) -> Option<DispatchOutcome> {
        let state = self.state();
        if !state.processes_inbound() {
            debug!(generation = self.generation, %state, "Dropping envelope received outside a live session");
            return None;
        }

        let envelope = match envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(generation = self.generation, error = %error, "Dropping malformed envelope");
                return None;
            }
        };

        let sink: Arc<dyn ProtocolSink> = self.clone();
        Some(self.dispatcher.dispatch(&envelope, &sink))
    }

    fn handle_lifecycle(&self, event: LifecycleEvent) {
        match &event {
            LifecycleEvent::Connected => info!(generation = self.generation, "Connected."),
            LifecycleEvent::Authenticated => {
                info!(generation = self.generation, "Authenticated.")
            }
            LifecycleEvent::ReconnectingIn { seconds } => {
                info!(generation = self.generation, seconds, "Transport reconnecting")
            }
            LifecycleEvent::ReconnectionSuccessful => {
                info!(generation = self.generation, "Transport reconnected")
            }
            LifecycleEvent::ReconnectionFailed { error } => {
                warn!(generation = self.generation, error = %error, "Transport reconnection failed")
            }
            LifecycleEvent::Closed | LifecycleEvent::ClosedOnError { .. } => {}
        }

        self.emit(ClientEvent::Lifecycle {
            generation: self.generation,
            event: event.clone(),
        });

        let error = match event {
            LifecycleEvent::Closed => None,
            LifecycleEvent::ClosedOnError { error } => Some(error),
            _ => return,
        };

        let prior_state = self.mark_closed();
        if prior_state == SessionState::Closed {
            debug!(generation = self.generation, "Closure for a session already closed");
            return;
        }
        match &error {
            Some(e) => warn!(generation = self.generation, %prior_state, error = %e, "Connection closed on error"),
            None => info!(generation = self.generation, %prior_state, "Connection closed"),
        }
        self.emit(ClientEvent::SessionClosed {
            generation: self.generation,
            prior_state,
            error,
        });
    }
}

impl<T: Transport + 'static> ProtocolSink for SessionInner<T> {
    fn send_ack(&self, ack: &AckMessage) -> Result<(), SessionError> {
        let text = envelope::encode_ack(ack)?;

        let state = self.state.read();
        if !state.accepts_protocol() {
            return Err(SessionError::NotConnected);
        }
        self.transport.send(&text).map_err(send_error)
    }

    fn begin_draining(&self) -> bool {
        {
            let mut state = self.state.write();
            match *state {
                SessionState::Connected => *state = SessionState::Draining,
                SessionState::Connecting => {
                    let first = !self.drain_pending.swap(true, Ordering::AcqRel);
                    if first {
                        info!(
                            generation = self.generation,
                            "Drain requested during handshake, deferring until connected"
                        );
                    }
                    return first;
                }
                _ => return false,
            }
        }

        self.announce_draining();
        true
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

/// Listener registered with the transport.
///
/// Holds a weak reference: a dropped session stops processing instead of
/// being kept alive by its own transport.
struct SessionListener<T: Transport> {
    session: Weak<SessionInner<T>>,
}

impl<T: Transport + 'static> TransportListener for SessionListener<T> {
    fn on_envelope(&self, text: String) {
        if let Some(session) = self.session.upgrade() {
            session.receive(&text);
        }
    }

    fn on_lifecycle(&self, event: LifecycleEvent) {
        if let Some(session) = self.session.upgrade() {
            session.handle_lifecycle(event);
        }
    }
}

fn send_error(error: NetworkError) -> SessionError {
    match error {
        NetworkError::NotConnected | NetworkError::ConnectionClosed => SessionError::NotConnected,
        other => SessionError::Transport(other),
    }
}
