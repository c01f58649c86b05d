//! Frame codec for relay → participant traffic.
//!
//! Every event is written as a compact JSON object followed by a `\n`
//! delimiter. Compact JSON never contains a raw newline, so the delimiter
//! cannot appear inside a frame.
//!
//! The decoder works on an accumulating byte buffer and tolerates reads that
//! split a frame or carry several frames at once. It scans each candidate
//! frame while tracking string and escape state, so a `}` inside a message
//! body never ends a frame. A frame that is cut short (a new `{` or a newline
//! appears where the object should continue) or that fails to parse is
//! dropped, and decoding resumes with the following bytes.

use tracing::warn;

use super::event::ChatEvent;
use crate::Result;

/// Byte terminating each encoded frame.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Outcome of scanning one candidate frame starting at a `{`.
#[derive(Debug, PartialEq, Eq)]
enum Scan {
    /// A balanced object of the given length.
    Complete(usize),
    /// The candidate is corrupt; skip this many bytes and resume.
    Broken(usize),
    /// More bytes are needed.
    Partial,
}

fn scan_frame(buf: &[u8]) -> Scan {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in buf.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            } else if byte == FRAME_DELIMITER {
                return Scan::Broken(i);
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            // Frames only carry string fields, so a nested object start means
            // the previous frame was truncated.
            b'{' if depth > 0 => return Scan::Broken(i),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Scan::Complete(i + 1);
                }
            }
            FRAME_DELIMITER => return Scan::Broken(i),
            _ => {}
        }
    }

    Scan::Partial
}

/// Encode an event as a delimited frame.
pub fn encode(event: &ChatEvent) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(event)?;
    bytes.push(FRAME_DELIMITER);
    Ok(bytes)
}

/// Decode every complete frame in `buffer`.
///
/// Consumed bytes are drained from the front of `buffer`; what remains is the
/// start of a frame that has not fully arrived yet.
pub fn decode(buffer: &mut Vec<u8>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    let mut cursor = 0;

    loop {
        match buffer[cursor..].iter().position(|&b| b == b'{') {
            Some(offset) => cursor += offset,
            None => {
                // Nothing left that could start a frame.
                cursor = buffer.len();
                break;
            }
        }

        match scan_frame(&buffer[cursor..]) {
            Scan::Complete(len) => {
                let slice = &buffer[cursor..cursor + len];
                match serde_json::from_slice::<ChatEvent>(slice) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!(
                        "Dropping malformed frame ({}): {}",
                        e,
                        String::from_utf8_lossy(slice)
                    ),
                }
                cursor += len;
            }
            Scan::Broken(len) => {
                warn!(
                    "Dropping truncated frame: {}",
                    String::from_utf8_lossy(&buffer[cursor..cursor + len])
                );
                cursor += len;
            }
            Scan::Partial => break,
        }
    }

    buffer.drain(..cursor);
    events
}

/// Incremental decoder owning its reassembly buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes and return every event they complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatEvent> {
        self.buffer.extend_from_slice(bytes);
        decode(&mut self.buffer)
    }

    /// Number of buffered bytes waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
