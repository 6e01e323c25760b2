//! Connection Handler Module
//!
//! This module handles individual client connections. Each client gets its
//! own task running the loop below until the peer disconnects or sends bytes
//! that can never form a frame.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, handler task spawned, connection registered
//!        │
//!        ▼
//! 2. ┌──────────────────────────────────┐
//!    │  READING                         │
//!    │    append bytes to the buffer    │
//!    │              │                   │
//!    │              ▼                   │
//!    │  DECODING (repeat)               │
//!    │    decode one frame              │
//!    │    dispatch it, queue the reply  │
//!    │              │                   │
//!    │              ▼                   │
//!    │  compact buffer, flush replies   │
//!    │              │                   │
//!    │         [Loop back]              │
//!    └──────────────────────────────────┘
//!        │
//!        ▼
//! 3. Read returns 0 / error / malformed frame
//!        │
//!        ▼
//! 4. Stream shut down, connection deregistered
//! ```
//!
//! ## Ordering
//!
//! Frames are dispatched one at a time in the order they were decoded, and
//! their replies are written in that same order. All replies produced by one
//! read are flushed together.

use crate::commands::Dispatcher;
use crate::connection::buffer::ConnectionBuffer;
use crate::connection::registry::ConnectionRegistry;
use crate::protocol::{decode, FrameError, Reply};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Handles a single client connection.
///
/// Generic over the stream so the loop can run on a `TcpStream` in
/// production and on an in-memory mock in tests.
pub struct ConnectionHandler<S> {
    /// The client stream, with buffered writes
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet decoded
    buffer: ConnectionBuffer,

    /// Serialized replies waiting to be flushed
    replies: Vec<u8>,

    dispatcher: Dispatcher,

    registry: Arc<ConnectionRegistry>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream
    /// * `addr` - The client's socket address
    /// * `dispatcher` - Executes decoded commands
    /// * `registry` - Shared registry of live connections
    /// * `buffer_size` - Initial read buffer capacity
    pub fn new(
        stream: S,
        addr: SocketAddr,
        dispatcher: Dispatcher,
        registry: Arc<ConnectionRegistry>,
        buffer_size: usize,
    ) -> Self {
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: ConnectionBuffer::with_capacity(buffer_size),
            replies: Vec::new(),
            dispatcher,
            registry,
        }
    }

    /// Runs the connection until the client goes away.
    ///
    /// A clean disconnect (EOF with nothing buffered) returns `Ok(())`.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let guard = self.registry.register(self.addr);
        info!(client = %self.addr, id = guard.id(), "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(e))
                if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::BrokenPipe) =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e @ ConnectionError::UnexpectedEof { .. }) => {
                debug!(client = %self.addr, error = %e, "Client disconnected mid-frame")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection closed with error"),
        }

        if let Err(e) = self.stream.shutdown().await {
            trace!(client = %self.addr, error = %e, "Shutdown failed");
        }

        drop(guard);
        result
    }

    /// The read-decode-dispatch loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let n = self.read_more_data().await?;
            if n == 0 {
                return if self.buffer.is_empty() {
                    Ok(())
                } else {
                    Err(ConnectionError::UnexpectedEof {
                        buffered: self.buffer.len(),
                    })
                };
            }

            let decoded = self.process_buffer();

            // Replies produced before a malformed frame are still delivered
            self.flush_replies().await?;
            decoded?;
        }
    }

    /// Reads more data from the stream into the buffer.
    ///
    /// Returns the number of bytes read; 0 means the peer closed its side.
    async fn read_more_data(&mut self) -> Result<usize, ConnectionError> {
        let n = self.buffer.read_from(self.stream.get_mut()).await?;

        if n > 0 {
            self.registry.stats().bytes_read(n);
            trace!(
                client = %self.addr,
                bytes = n,
                buffered = self.buffer.len(),
                capacity = self.buffer.capacity(),
                "Read data"
            );
        }

        Ok(n)
    }

    /// Decodes and dispatches every complete frame in the buffer, then drops
    /// the consumed bytes so only a trailing partial frame remains.
    fn process_buffer(&mut self) -> Result<(), FrameError> {
        let mut start = 0;

        let result = loop {
            match decode(&self.buffer.filled()[start..]) {
                Ok(Some((frame, consumed))) => {
                    start += consumed;

                    let reply = self.dispatcher.execute(&frame);
                    self.registry.stats().command_processed();
                    trace!(
                        client = %self.addr,
                        consumed = consumed,
                        args = frame.len(),
                        reply = %reply,
                        "Executed command"
                    );
                    if reply.is_error() {
                        debug!(client = %self.addr, reply = %reply, "Command failed");
                    }

                    reply.serialize_into(&mut self.replies);
                }
                Ok(None) => {
                    trace!(
                        client = %self.addr,
                        pending = self.buffer.len() - start,
                        "Incomplete command, need more data"
                    );
                    break Ok(());
                }
                Err(e) => {
                    warn!(client = %self.addr, error = %e, "Parse error");
                    Reply::error(format!("ERR Protocol error: {}", e))
                        .serialize_into(&mut self.replies);
                    break Err(e);
                }
            }
        };

        self.buffer.consume(start);
        result
    }

    /// Writes all queued replies with a single flush.
    async fn flush_replies(&mut self) -> Result<(), ConnectionError> {
        if self.replies.is_empty() {
            return Ok(());
        }

        self.stream.write_all(&self.replies).await?;
        self.stream.flush().await?;
        self.registry.stats().bytes_written(self.replies.len());
        trace!(
            client = %self.addr,
            bytes = self.replies.len(),
            "Sent replies"
        );

        self.replies.clear();
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Bytes that can never form a valid frame
    #[error("Protocol error: {0}")]
    Protocol(#[from] FrameError),

    /// The peer closed the stream in the middle of a frame
    #[error("Unexpected end of stream with {buffered} bytes buffered")]
    UnexpectedEof { buffered: usize },
}

/// Handles a client connection.
///
/// Convenience wrapper that creates a [`ConnectionHandler`] and runs it to
/// completion. Errors are already logged by the handler.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    dispatcher: Dispatcher,
    registry: Arc<ConnectionRegistry>,
    buffer_size: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, dispatcher, registry, buffer_size);
    if let Err(e) = handler.run().await {
        trace!(client = %addr, error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Frame;
    use crate::storage::StorageEngine;
    use std::sync::atomic::Ordering;
    use tokio_test::io::{Builder, Mock};

    struct Harness {
        handler: ConnectionHandler<Mock>,
        storage: Arc<StorageEngine>,
        registry: Arc<ConnectionRegistry>,
    }

    fn harness(mock: Mock, buffer_size: usize) -> Harness {
        let storage = Arc::new(StorageEngine::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let handler = ConnectionHandler::new(
            mock,
            SocketAddr::from(([127, 0, 0, 1], 40000)),
            Dispatcher::new(Arc::clone(&storage)),
            Arc::clone(&registry),
            buffer_size,
        );
        Harness {
            handler,
            storage,
            registry,
        }
    }

    fn command(parts: &[&str]) -> Vec<u8> {
        Frame::from_parts(parts.iter().map(|s| s.to_string())).encode()
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();

        assert!(harness(mock, 64).handler.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_set_get() {
        let mock = Builder::new()
            .read(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n")
            .write(b"+OK\r\n")
            .read(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
            .write(b"$1\r\nv\r\n")
            .read(b"*2\r\n$3\r\nGET\r\n$2\r\nnk\r\n")
            .write(b"$-1\r\n")
            .build();

        let h = harness(mock, 64);
        assert!(h.handler.run().await.is_ok());
        assert_eq!(h.storage.get(b"k"), Some(bytes::Bytes::from("v")));
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let mock = Builder::new()
            .read(b"*3\r\n$3\r\nSE")
            .read(b"T\r\n$1\r\nk\r\n$1")
            .read(b"\r\nv\r\n")
            .write(b"+OK\r\n")
            .build();

        assert!(harness(mock, 64).handler.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_frame_one_byte_per_read() {
        let frame = command(&["ECHO", "hello"]);
        let mut builder = Builder::new();
        for byte in &frame {
            builder.read(std::slice::from_ref(byte));
        }
        let mock = builder.write(b"$5\r\nhello\r\n").build();

        assert!(harness(mock, 64).handler.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_pipelined_commands_in_one_read() {
        let mut input = command(&["SET", "k", "v"]);
        input.extend(command(&["GET", "k"]));
        input.extend(command(&["DEL", "k", "other"]));
        input.extend(command(&["EXISTS", "k"]));
        input.extend(command(&["PING"]));

        let mock = Builder::new()
            .read(&input)
            .write(b"+OK\r\n$1\r\nv\r\n:1\r\n:0\r\n+PONG\r\n")
            .build();

        let h = harness(mock, 4096);
        assert!(h.handler.run().await.is_ok());
        let processed = h.registry.stats().commands_processed.load(Ordering::Relaxed);
        assert_eq!(processed, 5);
    }

    #[tokio::test]
    async fn test_pipelined_with_partial_tail() {
        let mut first = command(&["PING"]);
        let get = command(&["GET", "missing"]);
        let (head, tail) = get.split_at(7);
        first.extend_from_slice(head);

        let mock = Builder::new()
            .read(&first)
            .write(b"+PONG\r\n")
            .read(tail)
            .write(b"$-1\r\n")
            .build();

        assert!(harness(mock, 4096).handler.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_buffer_grows_for_large_frames() {
        let value = "x".repeat(1000);
        let mut expected = b"$1000\r\n".to_vec();
        expected.extend_from_slice(value.as_bytes());
        expected.extend_from_slice(b"\r\n");

        let mock = Builder::new()
            .read(&command(&["SET", "big", &value]))
            .write(b"+OK\r\n")
            .read(&command(&["GET", "big"]))
            .write(&expected)
            .build();

        let h = harness(mock, 4);
        assert!(h.handler.run().await.is_ok());
        assert_eq!(h.storage.get(b"big").map(|v| v.len()), Some(1000));
    }

    #[tokio::test]
    async fn test_one_byte_buffer_with_chunked_pipeline() {
        let mut input = command(&["SET", "key", "some longer value"]);
        input.extend(command(&["DEL", "key", "a", "b", "c"]));

        let mut builder = Builder::new();
        for chunk in input.chunks(3) {
            builder.read(chunk);
        }
        let mock = builder.write(b"+OK\r\n").write(b":1\r\n").build();

        let h = harness(mock, 1);
        assert!(h.handler.run().await.is_ok());
        assert!(h.storage.is_empty());
    }

    #[tokio::test]
    async fn test_errors_keep_connection_open() {
        let mock = Builder::new()
            .read(&command(&["FOO"]))
            .write(b"-ERR unknown command 'FOO'\r\n")
            .read(&command(&["GET"]))
            .write(b"-ERR wrong number of arguments for 'get' command\r\n")
            .read(&command(&["SET", "k", "v", "PX", "soon"]))
            .write(b"-ERR value is not an integer or out of range\r\n")
            .read(&command(&["PING"]))
            .write(b"+PONG\r\n")
            .build();

        assert!(harness(mock, 64).handler.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_connection() {
        let mock = Builder::new()
            .read(b"*1\r\n$x\r\n")
            .write(b"-ERR Protocol error: invalid length 'x'\r\n")
            .build();

        let result = harness(mock, 64).handler.run().await;
        assert!(matches!(
            result,
            Err(ConnectionError::Protocol(FrameError::InvalidLength(_)))
        ));
    }

    #[tokio::test]
    async fn test_replies_before_malformed_frame_are_sent() {
        let mut input = command(&["PING"]);
        input.extend_from_slice(b"GET k\r\n");

        let mock = Builder::new()
            .read(&input)
            .write(b"+PONG\r\n-ERR Protocol error: expected '*', got 'G'\r\n")
            .build();

        let result = harness(mock, 64).handler.run().await;
        assert!(matches!(result, Err(ConnectionError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_eof_mid_frame() {
        let mock = Builder::new().read(b"*1\r\n$4\r\nPI").build();

        let result = harness(mock, 64).handler.run().await;
        assert!(matches!(
            result,
            Err(ConnectionError::UnexpectedEof { buffered: 10 })
        ));
    }

    #[tokio::test]
    async fn test_read_error_closes_connection() {
        let mock = Builder::new()
            .read_error(std::io::Error::new(ErrorKind::ConnectionReset, "reset"))
            .build();

        let result = harness(mock, 64).handler.run().await;
        assert!(matches!(result, Err(ConnectionError::IoError(_))));
    }

    #[tokio::test]
    async fn test_registry_and_stats() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();

        let h = harness(mock, 64);
        let registry = Arc::clone(&h.registry);
        assert_eq!(registry.active_count(), 0);

        h.handler.run().await.unwrap();

        let stats = registry.stats();
        assert_eq!(registry.active_count(), 0);
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 14);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 7);
    }

    #[tokio::test]
    async fn test_handle_connection_swallows_errors() {
        let mock = Builder::new()
            .read(b"not resp\r\n")
            .write(b"-ERR Protocol error: expected '*', got 'n'\r\n")
            .build();
        let registry = Arc::new(ConnectionRegistry::new());

        handle_connection(
            mock,
            SocketAddr::from(([127, 0, 0, 1], 40001)),
            Dispatcher::new(Arc::new(StorageEngine::new())),
            Arc::clone(&registry),
            64,
        )
        .await;

        assert_eq!(registry.active_count(), 0);
    }
}
