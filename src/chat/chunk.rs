//! Chunked participant → relay messages.
//!
//! Participants write long messages in bounded chunks and terminate the
//! logical message with a newline, since the transport gives no framing
//! guarantee for large writes. [`LineAssembler`] is the receiving half.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Terminator of a logical participant message.
pub const MESSAGE_TERMINATOR: u8 = b'\n';

/// Split `text` into pieces of at most `max_bytes`, never inside a UTF-8 character.
///
/// A limit smaller than the next character still yields that whole character,
/// so every piece is non-empty.
pub fn split_chunks(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let mut end = rest.len().min(max_bytes);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}

/// Write `text` in chunks of at most `max_bytes`, pausing `delay` between
/// chunks, then write the message terminator.
pub async fn write_chunked<W>(
    writer: &mut W,
    text: &str,
    max_bytes: usize,
    delay: Duration,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for chunk in split_chunks(text, max_bytes) {
        writer.write_all(chunk.as_bytes()).await?;
        writer.flush().await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    writer.write_all(&[MESSAGE_TERMINATOR]).await?;
    writer.flush().await
}

/// Reassembles newline-terminated messages from arbitrary reads.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every message they complete.
    ///
    /// The terminator and a preceding `\r` are stripped. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == MESSAGE_TERMINATOR) {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Bytes received since the last complete message.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_chunks("hello", 1000), vec!["hello"]);
        assert!(split_chunks("", 1000).is_empty());
    }

    #[test]
    fn test_split_exact_multiple() {
        let text = "a".repeat(2000);
        let chunks = split_chunks(&text, 1000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 1000));
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        // Three-byte characters never line up with a 1000-byte limit.
        let text = "あ".repeat(700);
        let chunks = split_chunks(&text, 1000);

        assert!(chunks.iter().all(|c| c.len() <= 1000));
        assert_eq!(chunks[0].len(), 999);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_limit_below_char_width() {
        let text = "aé€😀";
        assert_eq!(split_chunks(text, 1), vec!["a", "é", "€", "😀"]);
        assert_eq!(split_chunks(text, 0), vec!["a", "é", "€", "😀"]);
        assert_eq!(split_chunks(text, 3), vec!["aé", "€", "😀"]);
    }

    #[test]
    fn test_assembler_joins_split_message() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"hel").is_empty());
        assert_eq!(assembler.pending(), 3);
        assert_eq!(assembler.push(b"lo\r\nwor"), vec!["hello".to_string()]);
        assert_eq!(assembler.push(b"ld\n"), vec!["world".to_string()]);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_assembler_multiple_lines_in_one_read() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"one\ntwo\n\nthree");
        assert_eq!(lines, vec!["one", "two", ""]);
        assert_eq!(assembler.pending(), 5);
    }

    #[tokio::test]
    async fn test_chunked_round_trip_2500_bytes() {
        let message: String = (0..2500).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let (mut writer, mut reader) = tokio::io::duplex(64);

        let sent = message.clone();
        let send = tokio::spawn(async move {
            write_chunked(&mut writer, &sent, 1000, Duration::from_millis(1))
                .await
                .unwrap();
        });

        let mut assembler = LineAssembler::new();
        let mut received = Vec::new();
        let mut buf = [0u8; 100];
        while received.is_empty() {
            let n = tokio::io::AsyncReadExt::read(&mut reader, &mut buf)
                .await
                .unwrap();
            assert!(n > 0, "writer closed before the terminator");
            received.extend(assembler.push(&buf[..n]));
        }
        send.await.unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), 2500);
        assert_eq!(received[0], message);
    }
}
