// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport Trait
//!
//! Platform-agnostic abstraction for the relay's streaming connection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::NetworkError;
use crate::credentials::Login;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, NetworkError>;

/// Default relay host.
pub const DEFAULT_HOST: &str = "gcm.googleapis.com";

/// Default relay port.
pub const DEFAULT_PORT: u16 = 5235;

/// Connection lifecycle notifications raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Socket established.
    Connected,
    /// Identity exchange accepted.
    Authenticated,
    /// Connection closed cleanly.
    Closed,
    /// Connection closed because of an error.
    ClosedOnError { error: String },
    /// The transport will retry its own connection shortly.
    ReconnectingIn { seconds: u32 },
    /// The transport's own reconnect attempt succeeded.
    ReconnectionSuccessful,
    /// The transport's own reconnect attempt failed.
    ReconnectionFailed { error: String },
}

impl LifecycleEvent {
    /// Returns true for the events that end the connection.
    pub fn is_closure(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::Closed | LifecycleEvent::ClosedOnError { .. }
        )
    }
}

/// Configuration for transport connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Relay host name.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Whether the connection is wrapped in TLS.
    pub use_tls: bool,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read/write timeout in milliseconds.
    pub io_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            use_tls: true,
            connect_timeout_ms: 10_000,
            io_timeout_ms: 30_000,
        }
    }
}

impl TransportConfig {
    /// Creates a config for a custom endpoint.
    pub fn with_endpoint(host: &str, port: u16) -> Self {
        TransportConfig {
            host: host.to_string(),
            port,
            ..Default::default()
        }
    }

    /// `host:port`, for logging.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Receives everything a transport delivers.
///
/// Both methods run on the transport's delivery path and must not panic.
pub trait TransportListener: Send + Sync {
    /// Called with the JSON text of each inbound envelope, in arrival order.
    fn on_envelope(&self, text: String);

    /// Called on every connection lifecycle change.
    fn on_lifecycle(&self, event: LifecycleEvent);
}

/// Transport trait for the relay connection.
///
/// Abstracts the wire framing and TLS so the session layer only deals with
/// JSON text. Methods take `&self`: inbound delivery may run concurrently
/// with sends, so implementations synchronize internally.
///
/// # Example
///
/// ```ignore
/// use pushlink_core::network::{MockTransport, Transport, TransportConfig};
///
/// let transport = MockTransport::new();
/// transport.set_listener(listener);
/// transport.open(&TransportConfig::default(), &credentials.login("gcm.googleapis.com"))?;
/// transport.send(r#"{"to":"device","message_id":"m-1","data":{}}"#)?;
/// transport.close()?;
/// ```
pub trait Transport: Send + Sync {
    /// Registers the listener for inbound envelopes and lifecycle events.
    ///
    /// Called before [`Transport::open`]; replaces any previous listener.
    fn set_listener(&self, listener: Arc<dyn TransportListener>);

    /// Opens the connection and performs the identity exchange.
    ///
    /// Returns `NetworkError::AuthenticationFailed` when the relay rejects
    /// the login.
    fn open(&self, config: &TransportConfig, login: &Login) -> TransportResult<()>;

    /// Sends one envelope.
    ///
    /// Returns `NetworkError::NotConnected` when the connection cannot accept
    /// writes right now.
    fn send(&self, text: &str) -> TransportResult<()>;

    /// Closes the connection.
    ///
    /// Safe to call even if not connected.
    fn close(&self) -> TransportResult<()>;
}
