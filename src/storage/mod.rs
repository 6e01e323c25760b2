//! Storage Engine Module
//!
//! The in-memory keyspace shared by every client connection: a mapping from
//! binary keys to binary values with optional per-key expiry.
//!
//! ## Features
//!
//! - **Single Lock**: One mutex serializes all store operations
//! - **TTL Support**: Keys can carry an absolute expiry instant
//! - **Lazy Expiry**: Expired keys are removed only when next accessed
//!
//! ## Example
//!
//! ```
//! use emberkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"), None);
//! assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
//!
//! engine.set_with_ttl(
//!     Bytes::from("session"),
//!     Bytes::from("token123"),
//!     Duration::from_secs(3600),
//! );
//! ```

pub mod engine;

pub use engine::{StorageEngine, StorageStats};
