// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session Layer
//!
//! Connection lifecycle, message-type dispatch, and the ack protocol.
//!
//! # Architecture
//!
//! - **Session**: owns one transport, the state machine, and message ids
//! - **Dispatcher**: routes decoded envelopes on `message_type`
//! - **Handlers**: embedder hooks for upstream messages and receipts
//!
//! The session state sits behind one lock shared by the send path and the
//! transport's delivery path, so a send can never slip through once
//! draining has begun.

#[cfg(feature = "testing")]
pub mod connection;
#[cfg(not(feature = "testing"))]
mod connection;

#[cfg(feature = "testing")]
pub mod dispatcher;
#[cfg(not(feature = "testing"))]
mod dispatcher;

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod handler;
#[cfg(not(feature = "testing"))]
mod handler;

#[cfg(feature = "testing")]
pub mod state;
#[cfg(not(feature = "testing"))]
mod state;

// Error types
pub use error::SessionError;

// State machine
pub use state::SessionState;

// Session
pub use connection::Session;

// Dispatch
pub use dispatcher::{DispatchOutcome, Dispatcher, ProtocolSink};
pub(crate) use dispatcher::guard_callback;

// Handlers
pub use handler::{
    HandlerError, Handlers, LoggingReceiptHandler, LoggingUpstreamHandler, ReceiptHandler,
    UpstreamCallback, UpstreamHandler,
};
