//! Stdin/stdout pump driving the framing engine and dispatcher.
//!
//! The browser delivers frames on stdin in arbitrary-sized chunks and reads
//! responses from stdout. The pump appends each chunk to the framing engine,
//! drains every message it completes in byte-stream order, dispatches them
//! one at a time, and frames each response back. Engine error events are
//! logged and dropped; they never terminate the host. Stdin EOF means the
//! extension disconnected and shuts the host down cleanly.

use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::{info, warn};

use bowline_config::FramingMode;
use bowline_proto::{FrameEngine, FrameEvent, FrameWriter, WriteError};

use crate::dispatch::Dispatcher;

pub(crate) const PUMP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pump");

/// Size of the stdin read buffer.
const CHUNK_BYTES: usize = 1024;

/// Failures that terminate the pump loop.
///
/// Only transport-level problems on the host's own stdio surface here;
/// everything protocol-related is absorbed as events or failure responses.
#[derive(Debug, Error)]
pub enum PumpError {
    /// Reading from stdin failed.
    #[error("failed to read from stdin: {0}")]
    Read(#[from] io::Error),
    /// Writing a response frame failed.
    #[error("failed to write response: {0}")]
    Write(#[from] WriteError),
    /// A response could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Runs the pump until stdin reaches EOF.
///
/// # Errors
///
/// Returns a [`PumpError`] when the host's own stdio breaks; protocol
/// failures are handled in place.
pub fn run<R: Read, W: Write>(
    mut input: R,
    output: W,
    mode: FramingMode,
    dispatcher: &mut Dispatcher,
) -> Result<(), PumpError> {
    let mut engine = FrameEngine::new(mode);
    let mut writer = FrameWriter::new(output);
    let mut chunk = [0_u8; CHUNK_BYTES];

    loop {
        let bytes_read = read_with_retry(&mut input, &mut chunk)?;
        if bytes_read == 0 {
            info!(target: PUMP_TARGET, "extension disconnected");
            return Ok(());
        }

        engine.push_chunk(&chunk[..bytes_read]);
        while let Some(event) = engine.next_event() {
            match event {
                FrameEvent::Message(payload) => {
                    let response = dispatcher.dispatch(payload);
                    writer.write_message(response.to_value()?)?;
                }
                FrameEvent::Error(error) => {
                    warn!(target: PUMP_TARGET, %error, "dropped undecodable input");
                }
            }
        }
    }
}

/// Reads from the stream, retrying on interrupts.
fn read_with_retry<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match input.read(buf) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}
