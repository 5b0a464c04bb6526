// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network + Transport Layer
//!
//! The seam between the session layer and the relay's streaming connection.
//!
//! # Architecture
//!
//! The network layer consists of:
//! - **Transport trait**: opens the authenticated connection and moves
//!   envelope text in both directions
//! - **Transport listener**: receives inbound envelopes and lifecycle events
//!   on the transport's delivery path
//! - **Mock transport**: in-memory implementation for tests
//!
//! Wire framing and TLS live behind the trait; nothing here parses JSON.

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod mock;
#[cfg(not(feature = "testing"))]
mod mock;

#[cfg(feature = "testing")]
pub mod transport;
#[cfg(not(feature = "testing"))]
mod transport;

// Error types
pub use error::NetworkError;

// Transport abstraction
pub use transport::{
    LifecycleEvent, Transport, TransportConfig, TransportListener, TransportResult, DEFAULT_HOST,
    DEFAULT_PORT,
};

// Mock transport for testing
pub use mock::MockTransport;
