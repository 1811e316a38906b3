//! Stream framing engine for the extension byte stream.
//!
//! The transport delivers bytes in arbitrary-sized chunks with no message
//! boundary guarantee. The engine owns the input buffer, reassembles
//! complete JSON payloads using the configured strategy, and validates each
//! through the envelope before emitting it.
//!
//! Two strategies exist. The strict strategy trusts the 4-byte little-endian
//! length header exactly. The tolerant strategy exists for extension builds
//! with an unreliable header near a message-size boundary: it keeps the
//! header bytes but locates boundaries by scanning for balanced JSON
//! objects.
//!
//! Consumers feed chunks with [`FrameEngine::push_chunk`] and drain the
//! event queue with [`FrameEngine::next_event`]; events come out in byte-
//! stream order.

mod strict;
mod tolerant;

use std::collections::VecDeque;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use bowline_config::FramingMode;

use crate::envelope::{self, EnvelopeError};

const FRAMING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::framing");

/// Number of bytes in the frame length header.
pub const HEADER_BYTES: usize = 4;

/// Maximum payload size honoured by either strategy (1 MiB).
///
/// Larger declared lengths are never honoured; memory use stays bounded
/// against a malicious or buggy peer.
pub const MAX_FRAME_BYTES: usize = 1_048_576;

/// Buffer growth bound for the tolerant strategy.
///
/// When no message boundary is found below this size, the stream is
/// considered desynchronized and the buffer is discarded.
pub const MAX_DESYNC_BYTES: usize = 10_000;

/// Events emitted by the framing engine, in byte-stream order.
#[derive(Debug)]
pub enum FrameEvent {
    /// A complete, validated message payload.
    Message(Value),
    /// A recoverable framing, parse, or envelope failure. The engine has
    /// already dropped the offending bytes and remains usable.
    Error(FrameError),
}

/// Recoverable failures surfaced as [`FrameEvent::Error`].
#[derive(Debug, Error)]
pub enum FrameError {
    /// The header declared a payload beyond [`MAX_FRAME_BYTES`]. The entire
    /// buffer was discarded.
    #[error("declared frame length {declared} exceeds the {MAX_FRAME_BYTES} byte limit")]
    Oversized {
        /// Length claimed by the header.
        declared: usize,
    },
    /// The tolerant strategy found no message boundary within
    /// [`MAX_DESYNC_BYTES`] buffered bytes. The entire buffer was discarded.
    #[error("framing buffer reached {buffered} bytes without a message boundary")]
    Desynchronized {
        /// Buffer size at the time of the reset.
        buffered: usize,
    },
    /// A complete frame payload was not valid JSON. The payload bytes were
    /// dropped.
    #[error("frame payload is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    /// A payload looked wrapped but failed envelope validation.
    #[error("failed to unwrap enveloped message: {0}")]
    Unwrap(#[source] EnvelopeError),
}

/// Outcome of a single strategy invocation against the buffer.
enum Extraction {
    /// A payload was extracted and parsed; consumed bytes are gone.
    Message(Value),
    /// Bytes were consumed or discarded but no message resulted.
    Failed(FrameError),
    /// No complete message is buffered yet.
    NeedMoreData,
}

/// Stateful reassembler turning raw chunks into validated messages.
///
/// The engine exclusively owns its input buffer: bytes are appended by
/// [`push_chunk`](Self::push_chunk) and removed only when a message is
/// consumed or a reset discards them. Bytes belonging to an already-emitted
/// message are never retained.
#[derive(Debug)]
pub struct FrameEngine {
    mode: FramingMode,
    buffer: Vec<u8>,
    events: VecDeque<FrameEvent>,
}

impl FrameEngine {
    /// Creates an engine using the given framing strategy.
    #[must_use]
    pub fn new(mode: FramingMode) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
            events: VecDeque::new(),
        }
    }

    /// Appends a transport chunk and drains every message it completes.
    ///
    /// The configured strategy runs repeatedly until it reports that no
    /// further message can be extracted, so multiple messages queued in one
    /// chunk all surface before control returns.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        loop {
            let extraction = match self.mode {
                FramingMode::Strict => strict::extract(&mut self.buffer),
                FramingMode::Tolerant => tolerant::extract(&mut self.buffer),
            };
            match extraction {
                Extraction::Message(value) => self.emit_parsed(value),
                Extraction::Failed(error) => {
                    warn!(target: FRAMING_TARGET, %error, "frame extraction failed");
                    self.events.push_back(FrameEvent::Error(error));
                }
                Extraction::NeedMoreData => break,
            }
        }
    }

    /// Removes and returns the next queued event, if any.
    pub fn next_event(&mut self) -> Option<FrameEvent> {
        self.events.pop_front()
    }

    /// Number of bytes currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Validates a parsed payload through the envelope and queues the result.
    ///
    /// Wrapped payloads must unwrap cleanly; unwrapped payloads are emitted
    /// directly for compatibility with senders predating the envelope.
    fn emit_parsed(&mut self, value: Value) {
        if envelope::is_wrapped(&value) {
            match envelope::unwrap(value) {
                Ok(inner) => self.events.push_back(FrameEvent::Message(inner)),
                Err(error) => {
                    warn!(target: FRAMING_TARGET, %error, "failed to unwrap message");
                    self.events
                        .push_back(FrameEvent::Error(FrameError::Unwrap(error)));
                }
            }
        } else {
            self.events.push_back(FrameEvent::Message(value));
        }
    }
}
