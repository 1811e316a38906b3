//! Message envelope adding a redundant integrity check.
//!
//! Every message crossing the host boundary is wrapped as
//! `{"length": <uint>, "message": <json>}`, where `length` is the exact
//! UTF-8 byte count of the serialized `message` field alone. The redundant
//! length lets the receiver detect truncated or corrupted payloads that
//! still happen to parse as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A message wrapped with its declared serialized length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// UTF-8 byte length of the serialized `message` value.
    pub length: u64,
    /// The wrapped payload.
    pub message: Value,
}

/// Errors raised while unwrapping a candidate envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The candidate does not have the envelope shape.
    #[error("value is not a wrapped message")]
    NotWrapped,
    /// The declared length disagrees with the serialized payload length.
    ///
    /// Any mismatch is treated as corruption; the envelope is rejected, not
    /// repaired.
    #[error("declared length {declared} does not match serialized length {actual}")]
    LengthMismatch {
        /// Length claimed by the envelope.
        declared: u64,
        /// Length measured from the serialized payload.
        actual: u64,
    },
    /// The payload could not be serialized for length verification.
    #[error("failed to serialize message payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Wraps a message, computing its declared serialized length.
///
/// # Errors
///
/// Returns a serialization error when the value cannot be rendered as JSON
/// text; this does not occur for values built from parsed JSON.
pub fn wrap(message: Value) -> Result<Envelope, serde_json::Error> {
    let length = serialized_byte_length(&message)?;
    Ok(Envelope { length, message })
}

/// Unwraps a candidate envelope, verifying the redundant length.
///
/// # Errors
///
/// Returns [`EnvelopeError::NotWrapped`] when the candidate lacks the
/// envelope shape and [`EnvelopeError::LengthMismatch`] when the declared
/// length disagrees with the serialized payload by any amount.
pub fn unwrap(candidate: Value) -> Result<Value, EnvelopeError> {
    let envelope: Envelope =
        serde_json::from_value(candidate).map_err(|_| EnvelopeError::NotWrapped)?;
    let actual = serialized_byte_length(&envelope.message)?;
    if actual != envelope.length {
        return Err(EnvelopeError::LengthMismatch {
            declared: envelope.length,
            actual,
        });
    }
    Ok(envelope.message)
}

/// Structural predicate deciding whether a parsed value looks wrapped.
///
/// Checks shape only: an object with exactly the two fields `length`
/// (a number) and `message`. The length match itself is verified by
/// [`unwrap`], not here.
#[must_use]
pub fn is_wrapped(candidate: &Value) -> bool {
    let Some(object) = candidate.as_object() else {
        return false;
    };
    object.len() == 2
        && object.get("length").is_some_and(Value::is_number)
        && object.contains_key("message")
}

fn serialized_byte_length(message: &Value) -> Result<u64, serde_json::Error> {
    serde_json::to_vec(message).map(|bytes| bytes.len() as u64)
}
