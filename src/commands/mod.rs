//! Command Module
//!
//! Receives decoded frames, executes them against the storage engine, and
//! returns the reply for each.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Frame Decoder  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Dispatcher    │  (this module)
//! │                 │
//! │  - Lookup       │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`, `ECHO`
//! - `SET` (with optional `PX`), `GET`
//! - `DEL`, `EXISTS`

pub mod dispatcher;
pub mod handler;

pub use dispatcher::{CommandSpec, Dispatcher, HandlerFn, COMMANDS};
