// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Transport
//!
//! In-memory transport for tests. Clones share state, so a test can keep a
//! handle after giving the transport to a session and drive inbound traffic
//! through it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::NetworkError;
use super::transport::{
    LifecycleEvent, Transport, TransportConfig, TransportListener, TransportResult,
};
use crate::credentials::Login;
use crate::envelope::{decode, Envelope};

struct MockState {
    open: bool,
    writable: bool,
    open_count: u32,
    sent: Vec<String>,
    listener: Option<Arc<dyn TransportListener>>,
    injected_error: Option<NetworkError>,
    last_login: Option<Login>,
    on_open: Vec<String>,
}

/// Mock transport recording sends and replaying scripted inbound traffic.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a closed, writable mock transport.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                open: false,
                writable: true,
                open_count: 0,
                sent: Vec::new(),
                listener: None,
                injected_error: None,
                last_login: None,
                on_open: Vec::new(),
            })),
        }
    }

    /// Makes the next [`Transport::open`] fail with `error`.
    pub fn inject_error(&self, error: NetworkError) {
        self.state.lock().injected_error = Some(error);
    }

    /// When false, sends fail with `NetworkError::NotConnected`.
    pub fn set_writable(&self, writable: bool) {
        self.state.lock().writable = writable;
    }

    /// Raw text of every envelope sent so far.
    pub fn sent_messages(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Sent envelopes, decoded.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.state
            .lock()
            .sent
            .iter()
            .filter_map(|text| decode(text).ok())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    /// Address presented on the most recent successful open.
    pub fn last_login_address(&self) -> Option<String> {
        self.state
            .lock()
            .last_login
            .as_ref()
            .map(|login| login.address().to_string())
    }

    /// Delivers an inbound envelope to the listener.
    ///
    /// Returns false if no listener is registered.
    pub fn deliver(&self, text: &str) -> bool {
        match self.listener() {
            Some(listener) => {
                listener.on_envelope(text.to_string());
                true
            }
            None => false,
        }
    }

    /// Queues an inbound envelope for the next successful open. It is
    /// delivered after `Authenticated`, before `open` returns.
    pub fn deliver_on_open(&self, text: &str) {
        self.state.lock().on_open.push(text.to_string());
    }

    /// Raises a lifecycle event on the listener.
    pub fn emit(&self, event: LifecycleEvent) -> bool {
        if event.is_closure() {
            self.state.lock().open = false;
        }
        match self.listener() {
            Some(listener) => {
                listener.on_lifecycle(event);
                true
            }
            None => false,
        }
    }

    /// Drops the connection as if the network failed.
    pub fn close_with_error(&self, error: &str) -> bool {
        self.emit(LifecycleEvent::ClosedOnError {
            error: error.to_string(),
        })
    }

    // The listener is cloned out so callbacks never run under the lock.
    fn listener(&self) -> Option<Arc<dyn TransportListener>> {
        self.state.lock().listener.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn set_listener(&self, listener: Arc<dyn TransportListener>) {
        self.state.lock().listener = Some(listener);
    }

    fn open(&self, _config: &TransportConfig, login: &Login) -> TransportResult<()> {
        let early = {
            let mut state = self.state.lock();
            if let Some(error) = state.injected_error.take() {
                return Err(error);
            }
            state.open = true;
            state.open_count += 1;
            state.last_login = Some(login.clone());
            std::mem::take(&mut state.on_open)
        };

        if let Some(listener) = self.listener() {
            listener.on_lifecycle(LifecycleEvent::Connected);
            listener.on_lifecycle(LifecycleEvent::Authenticated);
            for text in early {
                listener.on_envelope(text);
            }
        }
        Ok(())
    }

    fn send(&self, text: &str) -> TransportResult<()> {
        let mut state = self.state.lock();
        if !state.open || !state.writable {
            return Err(NetworkError::NotConnected);
        }
        state.sent.push(text.to_string());
        Ok(())
    }

    fn close(&self) -> TransportResult<()> {
        let was_open = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.open, false)
        };
        if was_open {
            if let Some(listener) = self.listener() {
                listener.on_lifecycle(LifecycleEvent::Closed);
            }
        }
        Ok(())
    }
}
