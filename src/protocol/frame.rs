//! Command Frames
//!
//! A frame is one complete request unit: an array of bulk strings whose
//! first element is the command name and whose remaining elements are its
//! arguments.
//!
//! ```text
//! *3\r\n$3\r\nSET\r\n$4\r\nname\r\n$4\r\nAriz\r\n
//! │     │          │            └── argument 2
//! │     │          └── argument 1
//! │     └── command name
//! └── element count
//! ```

use crate::protocol::reply::{prefix, CRLF};
use bytes::Bytes;

/// An ordered sequence of binary-safe arguments decoded from one request.
///
/// Frames are produced by [`decode`](crate::protocol::decode) and consumed
/// once by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    args: Vec<Bytes>,
}

impl Frame {
    /// Creates a frame from already-decoded arguments.
    pub fn new(args: Vec<Bytes>) -> Self {
        Self { args }
    }

    /// Builds a frame from anything that converts into `Bytes`.
    ///
    /// # Example
    /// ```
    /// use emberkv::protocol::Frame;
    /// let frame = Frame::from_parts(["GET", "name"]);
    /// assert_eq!(frame.len(), 2);
    /// ```
    pub fn from_parts<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Self {
            args: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// The command name, if the frame has one.
    pub fn name(&self) -> Option<&Bytes> {
        self.args.first()
    }

    /// All elements, including the command name at position 0.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Encodes the frame in request form (`*<N>` followed by N bulk strings).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Encodes the frame into an existing buffer.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(prefix::ARRAY);
        buf.extend_from_slice(self.args.len().to_string().as_bytes());
        buf.extend_from_slice(CRLF);
        for arg in &self.args {
            buf.push(prefix::BULK_STRING);
            buf.extend_from_slice(arg.len().to_string().as_bytes());
            buf.extend_from_slice(CRLF);
            buf.extend_from_slice(arg);
            buf.extend_from_slice(CRLF);
        }
    }

    fn encoded_len(&self) -> usize {
        // Rough upper bound: markers, CRLFs and up to 20 length digits each.
        let overhead = 1 + 20 + 2;
        overhead + self.args.iter().map(|a| overhead + a.len() + 2).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ping() {
        let frame = Frame::from_parts(["PING"]);
        assert_eq!(frame.encode(), b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn test_encode_set() {
        let frame = Frame::from_parts(["SET", "k", "v"]);
        assert_eq!(frame.encode(), b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }

    #[test]
    fn test_encode_empty_frame() {
        assert_eq!(Frame::default().encode(), b"*0\r\n");
    }

    #[test]
    fn test_name() {
        let frame = Frame::from_parts(["ECHO", "hi"]);
        assert_eq!(frame.name(), Some(&Bytes::from("ECHO")));
        assert!(Frame::default().name().is_none());
    }
}
