//! Command Dispatcher
//!
//! Maps a command name to its handler through a lookup table, checks the
//! argument count, and runs the handler against the storage engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  lookup()   │───>│ arity check │───>│  handler()  │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::handler;
use crate::protocol::{Frame, Reply};
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The common shape of every command handler: arguments after the command
/// name in, exactly one reply out.
pub type HandlerFn = fn(&StorageEngine, &[Bytes]) -> Reply;

/// One entry of the command table.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    /// Upper-case command name
    pub name: &'static str,
    /// Minimum number of elements in the frame, including the name
    pub arity: usize,
    pub handler: HandlerFn,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Every command the server understands.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "PING",
        arity: 1,
        handler: handler::ping,
    },
    CommandSpec {
        name: "ECHO",
        arity: 2,
        handler: handler::echo,
    },
    CommandSpec {
        name: "SET",
        arity: 3,
        handler: handler::set,
    },
    CommandSpec {
        name: "GET",
        arity: 2,
        handler: handler::get,
    },
    CommandSpec {
        name: "DEL",
        arity: 2,
        handler: handler::del,
    },
    CommandSpec {
        name: "EXISTS",
        arity: 2,
        handler: handler::exists,
    },
];

/// Routes decoded frames to command handlers.
///
/// Cloning is cheap; each connection holds its own clone sharing the same
/// storage engine and command table.
#[derive(Clone)]
pub struct Dispatcher {
    storage: Arc<StorageEngine>,
    table: Arc<HashMap<&'static str, CommandSpec>>,
}

impl Dispatcher {
    /// Creates a dispatcher serving the built-in command table.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self::with_commands(storage, COMMANDS)
    }

    /// Creates a dispatcher serving the given command table.
    pub fn with_commands(storage: Arc<StorageEngine>, commands: &[CommandSpec]) -> Self {
        let table = commands.iter().map(|spec| (spec.name, *spec)).collect();

        Self {
            storage,
            table: Arc::new(table),
        }
    }

    /// Executes a frame and returns the reply to send back.
    ///
    /// Logical failures (empty frame, unknown command, wrong arity, bad
    /// option) become error replies; they never end the connection.
    pub fn execute(&self, frame: &Frame) -> Reply {
        let Some(name) = frame.name() else {
            return Reply::error("ERR empty command");
        };

        let Some(spec) = self.lookup(name) else {
            return Reply::error(format!(
                "ERR unknown command '{}'",
                name.escape_ascii()
            ));
        };

        if frame.len() < spec.arity {
            return Reply::error(format!(
                "ERR wrong number of arguments for '{}' command",
                spec.name.to_ascii_lowercase()
            ));
        }

        (spec.handler)(&self.storage, &frame.args()[1..])
    }

    /// Finds the table entry for a command name, ignoring ASCII case.
    pub fn lookup(&self, name: &[u8]) -> Option<&CommandSpec> {
        let name = std::str::from_utf8(name).ok()?.to_ascii_uppercase();
        self.table.get(name.as_str())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.table.len())
            .finish()
    }
}
