// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Codec error types.

use thiserror::Error;

/// Errors produced while encoding or decoding envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}
