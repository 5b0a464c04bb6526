// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sender Credentials
//!
//! Identity and secret presented to the relay on connect. Supplied by the
//! embedder and never persisted by this crate.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Sender identity plus API key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    sender_id: u64,
    api_key: String,
}

impl Credentials {
    /// Creates credentials from a numeric sender id and API key.
    pub fn new(sender_id: u64, api_key: impl Into<String>) -> Self {
        Credentials {
            sender_id,
            api_key: api_key.into(),
        }
    }

    pub fn sender_id(&self) -> u64 {
        self.sender_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Builds the login presented during the identity exchange.
    pub fn login(&self, realm: &str) -> Login {
        Login {
            address: format!("{}@{}", self.sender_id, realm),
            secret: self.api_key.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("sender_id", &self.sender_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Address and secret handed to the transport's handshake.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Login {
    address: String,
    secret: String,
}

impl Login {
    /// `<senderId>@<realm>`.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}
