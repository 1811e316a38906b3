//! Strict framing strategy: 4-byte little-endian header, exact payload.

use super::{Extraction, FrameError, HEADER_BYTES, MAX_FRAME_BYTES};

/// Attempts to extract one frame from the front of the buffer.
///
/// The header is trusted exactly: the payload is not sliced until
/// `header + declared` bytes are buffered, and nothing is consumed before
/// then. A declared length beyond [`MAX_FRAME_BYTES`] is a protocol
/// violation that discards the entire buffer, header included, so a
/// malicious peer cannot pin memory with a huge claim.
pub(super) fn extract(buffer: &mut Vec<u8>) -> Extraction {
    let Some(header) = buffer.first_chunk::<HEADER_BYTES>() else {
        return Extraction::NeedMoreData;
    };
    let declared = u32::from_le_bytes(*header) as usize;

    if declared > MAX_FRAME_BYTES {
        buffer.clear();
        return Extraction::Failed(FrameError::Oversized { declared });
    }

    let total = HEADER_BYTES + declared;
    if buffer.len() < total {
        return Extraction::NeedMoreData;
    }

    let payload: Vec<u8> = buffer.drain(..total).skip(HEADER_BYTES).collect();
    match serde_json::from_slice(&payload) {
        Ok(value) => Extraction::Message(value),
        Err(error) => Extraction::Failed(FrameError::Parse(error)),
    }
}
