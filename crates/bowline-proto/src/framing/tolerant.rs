//! Tolerant framing strategy: brace-scanning fallback for unreliable headers.
//!
//! A known extension bug can emit a wrong length header for messages near a
//! byte-size boundary. This strategy keeps the 4-byte header in the stream
//! but ignores its value, locating message boundaries by scanning for the
//! first balanced `{...}` span instead. Brace counting tracks string
//! literals and backslash escapes so braces inside strings are never
//! miscounted.

use super::{Extraction, FrameError, HEADER_BYTES, MAX_DESYNC_BYTES};

/// Attempts to extract one message from the front of the buffer.
///
/// At most one message is emitted per call; the engine's drain loop
/// re-invokes for any bytes left behind. When a located span fails to parse
/// as JSON, the scan restarts past its opening brace within the same call.
/// Adversarial input can still mislocate boundaries across concatenated
/// objects; the desync valve bounds the damage by discarding the buffer.
pub(super) fn extract(buffer: &mut Vec<u8>) -> Extraction {
    if buffer.len() < HEADER_BYTES {
        return Extraction::NeedMoreData;
    }

    // Bytes past the valid prefix may be a multi-byte character still in
    // flight; they stay buffered for the next chunk.
    let body = buffer.get(HEADER_BYTES..).unwrap_or_default();
    let text = match std::str::from_utf8(body) {
        Ok(text) => text,
        Err(error) => {
            let valid = error.valid_up_to();
            body.get(..valid)
                .and_then(|prefix| std::str::from_utf8(prefix).ok())
                .unwrap_or_default()
        }
    };

    let mut scan_from = 0;
    loop {
        let Some(span) = balanced_span(text, scan_from) else {
            return give_up(buffer);
        };
        let Some(candidate) = text.get(span.start..span.end) else {
            return give_up(buffer);
        };
        match serde_json::from_str(candidate) {
            Ok(value) => {
                // Consume the header plus everything through the span end,
                // measured in UTF-8 bytes.
                buffer.drain(..HEADER_BYTES + span.end);
                return Extraction::Message(value);
            }
            Err(_) => {
                // The counted span was not the outer object; rescan from
                // just past its opening brace.
                scan_from = span.start + 1;
            }
        }
    }
}

/// Byte range of a balanced object span within the scanned text.
struct Span {
    /// Offset of the opening brace.
    start: usize,
    /// Offset one past the closing brace.
    end: usize,
}

/// Finds the first balanced `{...}` span at or after `from`.
///
/// A `"` that is not escaped toggles string state; structural braces are
/// only counted outside strings; the character following an escape is
/// always skipped from escape-state evaluation.
fn balanced_span(text: &str, from: usize) -> Option<Span> {
    let tail = text.get(from..)?;
    let start = from + tail.find('{')?;

    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;
    for (index, character) in text.get(start..)?.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match character {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(Span {
                        start,
                        end: start + index + 1,
                    });
                }
            }
            _ => {}
        }
    }
    None
}

/// No message this call: either wait for more bytes or, past the desync
/// threshold, declare the stream unrecoverable and discard the buffer.
fn give_up(buffer: &mut Vec<u8>) -> Extraction {
    if buffer.len() > MAX_DESYNC_BYTES {
        let buffered = buffer.len();
        buffer.clear();
        return Extraction::Failed(FrameError::Desynchronized { buffered });
    }
    Extraction::NeedMoreData
}
