// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Envelope Codec
//!
//! Converts between message records and their JSON text form.

use serde_json::Value;

use super::error::CodecError;
use super::message::{AckMessage, DownstreamMessage, Envelope};

/// Encodes a downstream message as a JSON object.
pub fn encode(message: &DownstreamMessage) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Encodes an ack for an upstream message.
pub fn encode_ack(ack: &AckMessage) -> Result<String, CodecError> {
    serde_json::to_string(ack).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decodes inbound JSON text into an envelope.
///
/// Anything other than a JSON object is a malformed payload.
pub fn decode(text: &str) -> Result<Envelope, CodecError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(fields)) => Ok(Envelope::from_fields(fields)),
        Ok(other) => Err(CodecError::MalformedPayload(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(CodecError::MalformedPayload(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
