// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reconnection
//!
//! Session replacement after draining and backoff after unexpected
//! closures.
//!
//! # Architecture
//!
//! - **Backoff**: capped exponential delays with jitter
//! - **ReconnectPolicy**: maps a closure to replace, back off, or ignore
//! - **PushClient**: owns the live session and runs the policy

#[cfg(feature = "testing")]
pub mod backoff;
#[cfg(not(feature = "testing"))]
mod backoff;

#[cfg(feature = "testing")]
pub mod client;
#[cfg(not(feature = "testing"))]
mod client;

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod policy;
#[cfg(not(feature = "testing"))]
mod policy;

// Error types
pub use error::ClientError;

// Policy
pub use backoff::Backoff;
pub use policy::{ReconnectDecision, ReconnectPolicy};

// Client
pub use client::{PushClient, PushClientBuilder};
