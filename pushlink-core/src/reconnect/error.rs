// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client error types.

use thiserror::Error;

use crate::session::SessionError;

/// Errors returned by [`super::PushClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Client is shut down")]
    ShutDown,
}

impl ClientError {
    /// Returns true if the caller should back off and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Session(e) if e.is_retryable())
    }

    /// Returns true when the relay rejected the credentials.
    pub fn is_authentication(&self) -> bool {
        matches!(self, ClientError::Session(e) if e.is_authentication())
    }
}
