//! RESP Protocol Implementation
//!
//! The request side of the Redis Serialization Protocol (arrays of bulk
//! strings) and the reply types the server sends back.
//!
//! ## Modules
//!
//! - `frame`: The `Frame` type holding one decoded command
//! - `decoder`: Incremental decoder for buffered request bytes
//! - `reply`: The `Reply` enum and its serialization
//!
//! ## Example
//!
//! ```
//! use emberkv::protocol::{decode, Reply};
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (frame, consumed) = decode(data).unwrap().unwrap();
//! assert_eq!(frame.len(), 2);
//! assert_eq!(consumed, data.len());
//!
//! assert_eq!(Reply::null().serialize(), b"$-1\r\n");
//! ```

pub mod decoder;
pub mod frame;
pub mod reply;

pub use decoder::{decode, DecodeResult, FrameError, MAX_BULK_SIZE};
pub use frame::Frame;
pub use reply::Reply;
