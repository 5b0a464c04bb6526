// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Envelope Codec
//!
//! JSON envelopes exchanged with the relay:
//! - **Downstream**: messages we address to devices
//! - **Ack**: our acknowledgment of an upstream message
//! - **Inbound**: upstream data, receipts, and control signals
//!
//! Decoding keeps unknown keys so newer relay fields never break parsing.
//!
//! # Example
//!
//! ```ignore
//! use pushlink_core::envelope::{decode, encode, DownstreamMessage};
//!
//! let msg = DownstreamMessage::builder("device-token", "m-1")
//!     .data("MESSAGE", "hello")
//!     .collapse_key("sample")
//!     .build()?;
//! let text = encode(&msg)?;
//! let envelope = decode(&text)?;
//! assert_eq!(envelope.message_id(), Some("m-1"));
//! ```

#[cfg(feature = "testing")]
pub mod codec;
#[cfg(not(feature = "testing"))]
mod codec;

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod message;
#[cfg(not(feature = "testing"))]
mod message;

// Error types
pub use error::CodecError;

// Message types
pub use message::{
    next_message_id, AckMessage, DownstreamMessage, DownstreamMessageBuilder, Envelope, MessageId,
    MessageType, Receipt, ReceiptKind, UpstreamMessage, CONNECTION_DRAINING, MAX_TIME_TO_LIVE,
    MESSAGE_ID_PREFIX,
};

// Codec
pub use codec::{decode, encode, encode_ack};
