//! # EmberKV - An In-Memory Key-Value Server
//!
//! EmberKV is a small in-memory key-value server that speaks the Redis
//! serialization protocol, so `redis-cli` and ordinary Redis clients can
//! talk to it.
//!
//! ## Features
//!
//! - **Redis-Compatible**: Requests are RESP arrays of bulk strings
//! - **Pipelining**: Several commands in one packet are answered in order
//! - **TTL Support**: `SET ... PX` keys expire lazily on access
//! - **Async I/O**: Built on Tokio, one task per client
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              EmberKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (JoinSet)   │    │  Handler    │    │ Dispatcher  │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │                     ┌─────────────┐    ┌──────────────────────────┐     │
//! │                     │   Frame     │    │      StorageEngine       │     │
//! │                     │  Decoder    │    │  values + expiries under │     │
//! │                     │  / Reply    │    │      a single Mutex      │     │
//! │                     └─────────────┘    └──────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use emberkv::server::{self, ServerOptions};
//! use emberkv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!
//!     server::run(listener, storage, ServerOptions::default(), tokio::signal::ctrl_c()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message`
//! - `SET key value [PX milliseconds]`
//! - `GET key`
//! - `DEL key [key ...]`
//! - `EXISTS key [key ...]`
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request frame decoder and reply encoder
//! - [`storage`]: Thread-safe keyspace with lazy expiry
//! - [`commands`]: Command table and handlers
//! - [`connection`]: Per-client read/dispatch/write loop
//! - [`server`]: Accept loop, client limit and shutdown
//! - [`config`]: Command-line configuration
//!
//! ## Design Highlights
//!
//! ### Lazy Expiry
//!
//! A key with a deadline is removed the first time a command touches it at
//! or after that deadline. There is no background sweeper, so an expired
//! key nobody reads again keeps its memory until it is overwritten or
//! deleted.
//!
//! ### Shared Values
//!
//! Keys and values are `bytes::Bytes`. Each argument is copied out of the
//! read buffer once; after that SET stores the handle and GET returns a
//! clone of it without copying the payload.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::Dispatcher;
pub use config::Config;
pub use connection::{handle_connection, ConnectionRegistry, ConnectionStats};
pub use protocol::{decode, Frame, FrameError, Reply};
pub use server::ServerOptions;
pub use storage::{StorageEngine, StorageStats};

/// The default port EmberKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host EmberKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
