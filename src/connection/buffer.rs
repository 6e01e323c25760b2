//! Per-connection read buffer.
//!
//! Bytes arrive from the socket in arbitrary chunks: a read may end in the
//! middle of a frame or hold several frames. The buffer keeps the bytes that
//! have not been decoded yet at the front, so each read appends after them.
//!
//! ```text
//!  start             len             capacity
//!  ├── filled() ──────┼── read room ────┤
//! ```
//!
//! Storage is a `BytesMut`. Consumed bytes are dropped from the front with
//! `advance`; when a read finds no room left the buffer reserves
//! `GROWTH_FACTOR - 1` times its current size, which `BytesMut` satisfies by
//! sliding the unread bytes back over the consumed space when that is enough
//! and by reallocating otherwise. There is no upper limit at this layer.

use bytes::{Buf, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Initial buffer capacity
pub const INITIAL_BUFFER_SIZE: usize = 4096;

/// Capacity multiplier applied when the buffer is full
pub const GROWTH_FACTOR: usize = 2;

/// A growable read buffer for one connection.
#[derive(Debug)]
pub struct ConnectionBuffer {
    data: BytesMut,
}

impl ConnectionBuffer {
    /// Creates a buffer with the given initial capacity (at least one byte).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity.max(1)),
        }
    }

    /// The valid bytes not yet consumed.
    pub fn filled(&self) -> &[u8] {
        &self.data
    }

    /// Reads once from `reader`, appending after the valid bytes.
    ///
    /// Returns the number of bytes read; 0 means end of stream.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.make_room();
        reader.read_buf(&mut self.data).await
    }

    /// Drops the first `n` valid bytes.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.data.len(), "consume past valid length");
        self.data.advance(n.min(self.data.len()));
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes the buffer can hold from its current start without growing.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn make_room(&mut self) {
        if self.data.len() == self.data.capacity() {
            let additional = self.data.capacity().max(1) * (GROWTH_FACTOR - 1);
            self.data.reserve(additional);
        }
    }
}

impl Default for ConnectionBuffer {
    fn default() -> Self {
        Self::with_capacity(INITIAL_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds all of `bytes` through as many reads as it takes.
    async fn append(buf: &mut ConnectionBuffer, bytes: &[u8]) -> usize {
        let mut rest = bytes;
        let mut reads = 0;
        while !rest.is_empty() {
            let n = buf.read_from(&mut rest).await.unwrap();
            assert!(n > 0);
            reads += 1;
        }
        reads
    }

    #[tokio::test]
    async fn test_read_and_consume() {
        let mut buf = ConnectionBuffer::with_capacity(16);
        assert_eq!(append(&mut buf, b"hello world").await, 1);
        assert_eq!(buf.filled(), b"hello world");

        buf.consume(6);
        assert_eq!(buf.filled(), b"world");
        assert_eq!(buf.len(), 5);
    }

    #[tokio::test]
    async fn test_consume_everything() {
        let mut buf = ConnectionBuffer::with_capacity(8);
        append(&mut buf, b"abc").await;
        buf.consume(3);
        assert!(buf.is_empty());

        append(&mut buf, b"defgh").await;
        assert_eq!(buf.filled(), b"defgh");
    }

    #[tokio::test]
    async fn test_consume_zero_is_noop() {
        let mut buf = ConnectionBuffer::with_capacity(8);
        append(&mut buf, b"abc").await;
        buf.consume(0);
        assert_eq!(buf.filled(), b"abc");
    }

    #[tokio::test]
    async fn test_read_stops_at_capacity_then_grows() {
        let mut buf = ConnectionBuffer::with_capacity(4);
        let mut input: &[u8] = b"abcdefghij";

        assert_eq!(buf.read_from(&mut input).await.unwrap(), 4);
        assert_eq!(buf.filled(), b"abcd");

        // Full: the next read doubles the room first
        assert_eq!(buf.read_from(&mut input).await.unwrap(), 4);
        assert!(buf.capacity() >= 8);

        buf.read_from(&mut input).await.unwrap();
        assert_eq!(buf.filled(), b"abcdefghij");
    }

    #[tokio::test]
    async fn test_consumed_space_is_reused() {
        let mut buf = ConnectionBuffer::with_capacity(8);
        append(&mut buf, b"12345678").await;
        buf.consume(5);
        assert_eq!(buf.filled(), b"678");

        append(&mut buf, b"abcde").await;
        assert_eq!(buf.filled(), b"678abcde");
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let mut buf = ConnectionBuffer::with_capacity(0);
        assert!(buf.capacity() >= 1);

        append(&mut buf, b"xyz").await;
        assert_eq!(buf.filled(), b"xyz");
    }

    #[tokio::test]
    async fn test_eof_reads_zero() {
        let mut buf = ConnectionBuffer::default();
        let mut empty: &[u8] = b"";
        assert_eq!(buf.read_from(&mut empty).await.unwrap(), 0);
        assert!(buf.is_empty());
    }
}
