//! Wire protocol for the Bowline native-messaging host.
//!
//! The extension side of the bridge speaks length-prefixed JSON frames over
//! stdin/stdout. This crate owns everything about that boundary: the
//! `{length, message}` envelope with its redundant integrity check, the
//! request/response message schema, the stream framing engine that
//! reassembles messages from arbitrarily chunked byte deliveries, and the
//! outbound frame writer.

pub mod envelope;
pub mod framing;
pub mod message;
pub mod writer;

pub use envelope::{Envelope, EnvelopeError, is_wrapped, unwrap, wrap};
pub use framing::{
    FrameEngine, FrameError, FrameEvent, HEADER_BYTES, MAX_DESYNC_BYTES, MAX_FRAME_BYTES,
};
pub use message::{Request, Response};
pub use writer::{FrameWriter, WriteError};
