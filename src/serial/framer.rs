//! Splits the device's byte stream into one response per command.
//!
//! The firmware answers either with a single `\n`-terminated line or with a
//! value wrapped in `::val::` sentinels, and nothing in the command tells us
//! which one is coming. The framer therefore reads one byte at a time and
//! switches to tagged mode as soon as the buffer starts with the sentinel.

use super::utf8::Utf8Accumulator;
use std::io::{self, ErrorKind, Read};
use tracing::{debug, warn};

/// Marker the firmware places on both sides of a tagged value.
pub const VALUE_SENTINEL: &str = "::val::";

/// How the framer decided the response was over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A complete `::val::<payload>::val::` token.
    Tagged,
    /// A line terminated by `\n`.
    Line,
    /// The link went quiet first; `tagged` records whether the opening
    /// sentinel had been seen.
    Partial { tagged: bool },
}

/// One framed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
    pub kind: FrameKind,
}

impl Frame {
    pub fn is_complete(&self) -> bool {
        !matches!(self.kind, FrameKind::Partial { .. })
    }

    /// A tagged frame whose closing sentinel never arrived.
    pub fn is_truncated_value(&self) -> bool {
        matches!(self.kind, FrameKind::Partial { tagged: true })
    }
}

/// Format `value` exactly the way the firmware emits tagged values.
pub fn wrap(value: &str) -> String {
    format!("{VALUE_SENTINEL}{value}{VALUE_SENTINEL}")
}

/// Return the payload of a well-formed tagged response.
pub fn unwrap(response: &str) -> Option<&str> {
    let inner = response.strip_prefix(VALUE_SENTINEL)?;
    inner.strip_suffix(VALUE_SENTINEL)
}

/// Read one byte. `None` means the read came back empty (timeout or EOF).
fn read_byte<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(None)
            }
            Err(err) => return Err(err),
        }
    }
}

fn strip_line_ending(buffer: &str) -> String {
    buffer.trim_end_matches(['\r', '\n']).to_string()
}

/// Byte-at-a-time response reader.
///
/// Decode errors are dropped silently; only real I/O failures are returned.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> io::Result<Frame> {
    let mut decoder = Utf8Accumulator::new();
    let mut buffer = String::new();

    while let Some(byte) = read_byte(reader)? {
        let chunk = decoder.push(byte);
        buffer.push_str(&chunk);

        if buffer.starts_with(VALUE_SENTINEL) {
            return read_tagged_tail(reader, &mut decoder, buffer);
        }
        if chunk.contains('\n') {
            return Ok(Frame {
                text: strip_line_ending(&buffer),
                kind: FrameKind::Line,
            });
        }
    }

    debug!(partial = %buffer, "serial read went quiet before a terminator");
    Ok(Frame {
        text: strip_line_ending(&buffer),
        kind: FrameKind::Partial { tagged: false },
    })
}

fn read_tagged_tail<R: Read + ?Sized>(
    reader: &mut R,
    decoder: &mut Utf8Accumulator,
    mut buffer: String,
) -> io::Result<Frame> {
    let open = VALUE_SENTINEL.len();
    loop {
        if let Some(offset) = buffer[open..].find(VALUE_SENTINEL) {
            let end = open + offset + VALUE_SENTINEL.len();
            buffer.truncate(end);
            return Ok(Frame {
                text: buffer,
                kind: FrameKind::Tagged,
            });
        }
        match read_byte(reader)? {
            Some(byte) => buffer.push_str(&decoder.push(byte)),
            None => break,
        }
    }

    warn!(partial = %buffer, "tagged value never closed before timeout");
    Ok(Frame {
        text: strip_line_ending(&buffer),
        kind: FrameKind::Partial { tagged: true },
    })
}
