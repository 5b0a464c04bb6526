// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport error types.

use thiserror::Error;

/// Errors reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport not connected")]
    NotConnected,

    #[error("Connection timeout")]
    Timeout,

    #[error("Send failed: {0}")]
    SendFailed(String),
}
