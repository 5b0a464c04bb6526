// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Envelope Message Types
//!
//! Wire-level message records exchanged with the relay.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{serde_as, DurationSeconds};
use uuid::Uuid;

use super::error::CodecError;

/// Message identifier used for ack/nack correlation.
pub type MessageId = String;

/// Prefix distinguishing message identifiers from other identifier namespaces.
pub const MESSAGE_ID_PREFIX: &str = "m-";

/// Longest time-to-live the relay accepts (4 weeks).
pub const MAX_TIME_TO_LIVE: Duration = Duration::from_secs(2_419_200);

/// Control type announcing that the relay is about to close the connection.
pub const CONNECTION_DRAINING: &str = "CONNECTION_DRAINING";

/// Returns a fresh message identifier (`m-` followed by a random UUID).
pub fn next_message_id() -> MessageId {
    format!("{}{}", MESSAGE_ID_PREFIX, Uuid::new_v4())
}

/// Value of the `message_type` discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// No `message_type` key: an upstream data message from a device.
    Upstream,
    /// Delivery confirmation for a message we sent.
    Ack,
    /// Delivery failure for a message we sent.
    Nack,
    /// Protocol control signal.
    Control,
    /// A type this client does not know about.
    Other(String),
}

impl MessageType {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => MessageType::Upstream,
            Some(Value::String(s)) => match s.as_str() {
                "ack" => MessageType::Ack,
                "nack" => MessageType::Nack,
                "control" => MessageType::Control,
                other => MessageType::Other(other.to_string()),
            },
            Some(other) => MessageType::Other(other.to_string()),
        }
    }
}

/// A decoded JSON envelope.
///
/// Keeps every top-level key it was decoded from, including ones this
/// client does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    /// Wraps an already-parsed JSON object.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Envelope { fields }
    }

    /// All top-level fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a raw top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::from_value(self.fields.get("message_type"))
    }

    pub fn message_id(&self) -> Option<&str> {
        self.str_field("message_id")
    }

    pub fn from(&self) -> Option<&str> {
        self.str_field("from")
    }

    pub fn to(&self) -> Option<&str> {
        self.str_field("to")
    }

    /// Package name of the application that sent an upstream message.
    pub fn category(&self) -> Option<&str> {
        self.str_field("category")
    }

    pub fn control_type(&self) -> Option<&str> {
        self.str_field("control_type")
    }

    /// The `data` payload as a string map.
    ///
    /// Non-string values are kept as their JSON text. A missing or non-object
    /// `data` field yields an empty map.
    pub fn data(&self) -> HashMap<String, String> {
        match self.fields.get("data") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect(),
            _ => HashMap::new(),
        }
    }

    /// Typed view of an upstream data message.
    ///
    /// Returns `None` when `from` or `message_id` is missing, since such a
    /// message cannot be acknowledged.
    pub fn upstream(&self) -> Option<UpstreamMessage> {
        Some(UpstreamMessage {
            from: self.from()?.to_string(),
            message_id: self.message_id()?.to_string(),
            category: self.category().map(str::to_string),
            data: self.data(),
        })
    }

    /// Typed view of an ack or nack receipt.
    pub fn receipt(&self) -> Option<Receipt> {
        let kind = match self.message_type() {
            MessageType::Ack => ReceiptKind::Ack,
            MessageType::Nack => ReceiptKind::Nack,
            _ => return None,
        };

        Some(Receipt {
            kind,
            message_id: self.message_id()?.to_string(),
            from: self.from().map(str::to_string),
            error: self.str_field("error").map(str::to_string),
            error_description: self.str_field("error_description").map(str::to_string),
        })
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// An upstream data message sent by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamMessage {
    /// Registration id of the sending device.
    pub from: String,
    /// Id to acknowledge.
    pub message_id: MessageId,
    /// Package name of the sending application, when present.
    pub category: Option<String>,
    /// Application payload.
    pub data: HashMap<String, String>,
}

/// Whether a receipt confirms or reports failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptKind {
    Ack,
    Nack,
}

/// Delivery receipt for a downstream message this client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub kind: ReceiptKind,
    /// Id of the downstream message this receipt refers to.
    pub message_id: MessageId,
    /// Registration id the downstream message was addressed to.
    pub from: Option<String>,
    /// Relay error code (nack only).
    pub error: Option<String>,
    /// Human-readable error detail (nack only).
    pub error_description: Option<String>,
}

/// Ack sent back to the relay for an upstream message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AckMessage {
    message_type: &'static str,
    to: String,
    message_id: MessageId,
}

impl AckMessage {
    /// Creates an ack addressed to the device that sent `message_id`.
    pub fn new(to: impl Into<String>, message_id: impl Into<MessageId>) -> Self {
        AckMessage {
            message_type: "ack",
            to: to.into(),
            message_id: message_id.into(),
        }
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

/// A message addressed to a device.
///
/// Built with [`DownstreamMessage::builder`] and immutable afterwards.
/// Optional fields are omitted from the wire form when unset.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamMessage {
    to: String,
    message_id: MessageId,
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collapse_key: Option<String>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    time_to_live: Option<Duration>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    delay_while_idle: bool,
}

impl DownstreamMessage {
    /// Starts building a message for `to` with the given id.
    pub fn builder(
        to: impl Into<String>,
        message_id: impl Into<MessageId>,
    ) -> DownstreamMessageBuilder {
        DownstreamMessageBuilder {
            to: to.into(),
            message_id: message_id.into(),
            data: BTreeMap::new(),
            collapse_key: None,
            time_to_live: None,
            delay_while_idle: false,
        }
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    pub fn collapse_key(&self) -> Option<&str> {
        self.collapse_key.as_deref()
    }

    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live
    }

    pub fn delay_while_idle(&self) -> bool {
        self.delay_while_idle
    }
}

/// Builder for [`DownstreamMessage`].
#[derive(Debug, Clone)]
pub struct DownstreamMessageBuilder {
    to: String,
    message_id: MessageId,
    data: BTreeMap<String, String>,
    collapse_key: Option<String>,
    time_to_live: Option<Duration>,
    delay_while_idle: bool,
}

impl DownstreamMessageBuilder {
    /// Adds one payload entry.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Replaces the payload.
    pub fn payload<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn collapse_key(mut self, key: impl Into<String>) -> Self {
        self.collapse_key = Some(key.into());
        self
    }

    /// Sets the time-to-live. Sent in whole seconds.
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    pub fn delay_while_idle(mut self, delay: bool) -> Self {
        self.delay_while_idle = delay;
        self
    }

    /// Validates and builds the message.
    pub fn build(self) -> Result<DownstreamMessage, CodecError> {
        if self.to.is_empty() {
            return Err(CodecError::InvalidMessage("missing recipient".into()));
        }
        if self.message_id.is_empty() {
            return Err(CodecError::InvalidMessage("missing message id".into()));
        }
        if let Some(ttl) = self.time_to_live {
            if ttl > MAX_TIME_TO_LIVE {
                return Err(CodecError::InvalidMessage(format!(
                    "time_to_live {}s exceeds maximum of {}s",
                    ttl.as_secs(),
                    MAX_TIME_TO_LIVE.as_secs()
                )));
            }
        }

        Ok(DownstreamMessage {
            to: self.to,
            message_id: self.message_id,
            data: self.data,
            collapse_key: self.collapse_key,
            time_to_live: self.time_to_live,
            delay_while_idle: self.delay_while_idle,
        })
    }
}
