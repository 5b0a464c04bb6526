// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session error types.

use thiserror::Error;

use super::state::SessionState;
use crate::envelope::CodecError;
use crate::network::NetworkError;

/// Errors returned by session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Connect failed: {0}")]
    Connect(#[source] NetworkError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Session not connected")]
    NotConnected,

    #[error("Session is draining, downstream message rejected")]
    RejectedDraining,

    #[error("Invalid session state: {0}")]
    InvalidState(SessionState),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Transport error: {0}")]
    Transport(#[source] NetworkError),
}

impl SessionError {
    /// Returns true if the caller should back off and retry the send.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::NotConnected)
    }

    /// Returns true for credential rejection, which retrying cannot fix.
    pub fn is_authentication(&self) -> bool {
        matches!(self, SessionError::Authentication(_))
    }
}

impl From<CodecError> for SessionError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::MalformedPayload(msg) => SessionError::MalformedPayload(msg),
            CodecError::Encode(msg) => SessionError::Encode(msg),
            CodecError::InvalidMessage(msg) => SessionError::InvalidMessage(msg),
        }
    }
}
