//! Outbound frame writer.
//!
//! Every message leaving the host is wrapped in the envelope, serialized,
//! and framed with the 4-byte little-endian length header the extension
//! expects. The writer enforces the same payload bound as the reader.

use std::io::{self, Write};

use serde_json::Value;
use thiserror::Error;

use crate::envelope;
use crate::framing::MAX_FRAME_BYTES;

/// Errors raised while writing an outbound frame.
#[derive(Debug, Error)]
pub enum WriteError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The envelope or payload could not be serialized.
    #[error("failed to serialize outbound frame: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The serialized frame exceeds the payload bound.
    #[error("outbound frame of {size} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    Oversized {
        /// Serialized envelope size in bytes.
        size: usize,
    },
}

/// Writes enveloped, length-prefixed frames to a byte stream.
#[derive(Debug)]
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a writer over the given output stream.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Wraps, frames, and flushes one message.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Oversized`] when the serialized envelope
    /// exceeds the payload bound, or an I/O / serialization error.
    pub fn write_message(&mut self, message: Value) -> Result<(), WriteError> {
        let envelope = envelope::wrap(message)?;
        let payload = serde_json::to_vec(&envelope)?;
        let size = payload.len();
        if size > MAX_FRAME_BYTES {
            return Err(WriteError::Oversized { size });
        }

        let header = u32::try_from(size)
            .map_err(|_| WriteError::Oversized { size })?
            .to_le_bytes();
        self.writer.write_all(&header)?;
        self.writer.write_all(&payload)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consumes the writer, returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
