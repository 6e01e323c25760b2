//! Incremental Frame Decoder
//!
//! Turns the bytes a connection has buffered so far into command frames.
//! The decoder is a pure function over a byte slice: it does no I/O and keeps
//! no state between calls, so the caller can retry after every read.
//!
//! ## Results
//!
//! - `Ok(Some((frame, consumed)))` - one complete frame; `consumed` bytes were used
//! - `Ok(None)` - the frame is not complete yet, nothing was consumed
//! - `Err(FrameError)` - the bytes can never become a valid frame
//!
//! Only the request grammar is accepted: an array of bulk strings.
//!
//! ```text
//! *<N>\r\n  then N times  $<L>\r\n<L bytes>\r\n
//! ```

use crate::protocol::frame::Frame;
use crate::protocol::reply::{prefix, CRLF};
use bytes::Bytes;
use std::ops::Range;
use thiserror::Error;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Upper bound on argument slots reserved before the elements are seen.
const MAX_PREALLOC_ARGS: usize = 64;

/// A frame that can never be decoded, no matter how many bytes follow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A type marker other than the one the grammar requires here
    #[error("expected {expected:?}, got {found:?}")]
    UnexpectedByte { expected: char, found: char },

    /// A count or length line that is not a plain decimal number
    #[error("invalid length '{0}'")]
    InvalidLength(String),

    /// A count or length that does not fit in memory addressing
    #[error("length overflow")]
    LengthOverflow,

    /// Payload not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    /// The bulk string exceeds the maximum allowed size
    #[error("bulk string too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

pub type DecodeResult = Result<Option<(Frame, usize)>, FrameError>;

/// Attempts to decode exactly one frame from the start of `buf`.
///
/// `buf` must hold only valid bytes; the caller passes the filled part of its
/// buffer. Several frames may be present back to back; each call decodes the
/// first and reports how far to advance.
///
/// # Example
///
/// ```
/// use emberkv::protocol::decode;
///
/// let (frame, consumed) = decode(b"*1\r\n$4\r\nPING\r\n").unwrap().unwrap();
/// assert_eq!(frame.args()[0].as_ref(), b"PING");
/// assert_eq!(consumed, 14);
///
/// assert!(decode(b"*1\r\n$4\r\nPI").unwrap().is_none());
/// ```
pub fn decode(buf: &[u8]) -> DecodeResult {
    let Some(layout) = scan(buf)? else {
        return Ok(None);
    };

    let args = layout
        .elements
        .into_iter()
        .map(|range| Bytes::copy_from_slice(&buf[range]))
        .collect();

    Ok(Some((Frame::new(args), layout.end)))
}

/// Where each element payload of a complete frame sits in the buffer.
#[derive(Debug, PartialEq, Eq)]
struct Layout {
    elements: Vec<Range<usize>>,
    end: usize,
}

/// Validates the frame at the start of `buf` without copying any payload.
///
/// Payloads are only copied once the whole frame is known to be present, so
/// a frame that trickles in over many reads costs one copy in total.
fn scan(buf: &[u8]) -> Result<Option<Layout>, FrameError> {
    let Some(&marker) = buf.first() else {
        return Ok(None);
    };
    if marker != prefix::ARRAY {
        return Err(unexpected(prefix::ARRAY, marker));
    }

    let (count, mut pos) = match parse_length(buf, 1)? {
        Some(line) => line,
        None => return Ok(None),
    };

    let mut elements = Vec::with_capacity(count.min(MAX_PREALLOC_ARGS));

    for _ in 0..count {
        let Some(&marker) = buf.get(pos) else {
            return Ok(None);
        };
        if marker != prefix::BULK_STRING {
            return Err(unexpected(prefix::BULK_STRING, marker));
        }

        let (length, data_start) = match parse_length(buf, pos + 1)? {
            Some(line) => line,
            None => return Ok(None),
        };

        if length > MAX_BULK_SIZE {
            return Err(FrameError::TooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let data_end = data_start + length;
        if buf.len() < data_end + CRLF.len() {
            return Ok(None);
        }
        if &buf[data_end..data_end + CRLF.len()] != CRLF {
            return Err(FrameError::MissingCrlf);
        }

        elements.push(data_start..data_end);
        pos = data_end + CRLF.len();
    }

    Ok(Some(Layout { elements, end: pos }))
}

/// Parses a decimal length line starting at `start`.
///
/// Returns the value and the index just past its CRLF. Bad bytes are
/// reported as soon as they are seen, without waiting for the line ending.
fn parse_length(buf: &[u8], start: usize) -> Result<Option<(usize, usize)>, FrameError> {
    let mut value: usize = 0;
    let mut pos = start;

    loop {
        let Some(&byte) = buf.get(pos) else {
            return Ok(None);
        };

        match byte {
            b'0'..=b'9' => {
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(usize::from(byte - b'0')))
                    .ok_or(FrameError::LengthOverflow)?;
                pos += 1;
            }
            b'\r' if pos > start => {
                return match buf.get(pos + 1) {
                    None => Ok(None),
                    Some(b'\n') => Ok(Some((value, pos + 2))),
                    Some(_) => Err(invalid_length(&buf[start..pos + 2])),
                };
            }
            _ => return Err(invalid_length(&buf[start..=pos])),
        }
    }
}

fn unexpected(expected: u8, found: u8) -> FrameError {
    FrameError::UnexpectedByte {
        expected: char::from(expected),
        found: char::from(found),
    }
}

fn invalid_length(text: &[u8]) -> FrameError {
    FrameError::InvalidLength(text.escape_ascii().to_string())
}
