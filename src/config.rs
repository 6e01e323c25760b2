//! Server configuration.
//!
//! Everything is set from the command line; there is no config file.
//! `RUST_LOG`, when set, takes precedence over `--log-level`.

use crate::connection::INITIAL_BUFFER_SIZE;
use crate::server::ServerOptions;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;

/// Command-line arguments for the server
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "emberkv")]
#[command(version)]
#[command(about = "An in-memory key-value server speaking the Redis protocol", long_about = None)]
pub struct Config {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Maximum number of simultaneous clients (unlimited when omitted)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_clients: Option<u32>,

    /// Initial per-connection read buffer size in bytes
    #[arg(long, default_value_t = INITIAL_BUFFER_SIZE, value_parser = parse_buffer_size)]
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            max_clients: None,
            buffer_size: INITIAL_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The options the accept loop and connections run with.
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_clients: self.max_clients.map(|n| n as usize),
            buffer_size: self.buffer_size,
        }
    }
}

fn parse_buffer_size(s: &str) -> Result<usize, String> {
    let size: usize = s.parse().map_err(|e| format!("{}", e))?;
    if size == 0 {
        return Err("buffer size must be at least 1 byte".to_string());
    }
    Ok(size)
}
