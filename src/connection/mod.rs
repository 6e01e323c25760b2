//! Connection Handler Module
//!
//! This module manages individual client connections. Each client
//! connection is handled by its own async task, so a slow client never
//! blocks the others.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept() + spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│ Decode all  │───>│ Dispatch    │      │
//! │  │ into buffer │    │ full frames │    │ each frame  │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Flush reply │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Partial Reads**: Incomplete frames wait in a growable buffer
//! - **Pipelining**: Several commands in one read are answered in order
//! - **Registry**: Live connections and traffic counters are tracked
//!
//! ## Example
//!
//! ```ignore
//! use emberkv::commands::Dispatcher;
//! use emberkv::connection::{handle_connection, ConnectionRegistry, INITIAL_BUFFER_SIZE};
//! use emberkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let registry = Arc::new(ConnectionRegistry::new());
//! let dispatcher = Dispatcher::new(storage);
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, dispatcher, registry, INITIAL_BUFFER_SIZE));
//! ```

pub mod buffer;
pub mod handler;
pub mod registry;

pub use buffer::{ConnectionBuffer, GROWTH_FACTOR, INITIAL_BUFFER_SIZE};
pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
pub use registry::{ConnectionGuard, ConnectionId, ConnectionRegistry, ConnectionStats};
