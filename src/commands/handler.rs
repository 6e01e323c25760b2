//! Command Handlers
//!
//! One function per supported command. Each receives the arguments that
//! follow the command name; the dispatcher has already checked the minimum
//! argument count against the command table, so indexing up to that count is
//! safe.
//!
//! ## Supported Commands
//!
//! - `PING` - Test connection
//! - `ECHO message` - Echo message
//! - `SET key value [PX milliseconds]` - Set a key
//! - `GET key` - Get a key's value
//! - `DEL key [key ...]` - Delete keys
//! - `EXISTS key [key ...]` - Count existing keys

use crate::protocol::Reply;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::time::{Duration, Instant};

/// PING
///
/// Extra arguments are ignored.
pub fn ping(_storage: &StorageEngine, _args: &[Bytes]) -> Reply {
    Reply::pong()
}

/// ECHO message
pub fn echo(_storage: &StorageEngine, args: &[Bytes]) -> Reply {
    Reply::bulk_string(args[0].clone())
}

/// SET key value [PX milliseconds]
///
/// Without PX any previous expiry on the key is cleared. An invalid option
/// rejects the whole command and nothing is written.
pub fn set(storage: &StorageEngine, args: &[Bytes]) -> Reply {
    let expires_at = match parse_set_options(&args[2..]) {
        Ok(expires_at) => expires_at,
        Err(reply) => return reply,
    };

    storage.set(args[0].clone(), args[1].clone(), expires_at);
    Reply::ok()
}

/// GET key
pub fn get(storage: &StorageEngine, args: &[Bytes]) -> Reply {
    match storage.get(&args[0]) {
        Some(value) => Reply::bulk_string(value),
        None => Reply::null(),
    }
}

/// DEL key [key ...]
pub fn del(storage: &StorageEngine, args: &[Bytes]) -> Reply {
    Reply::integer(storage.delete(args) as i64)
}

/// EXISTS key [key ...]
pub fn exists(storage: &StorageEngine, args: &[Bytes]) -> Reply {
    Reply::integer(storage.exists_count(args) as i64)
}

// ========================================================================
// Helper functions
// ========================================================================

/// Parses the options after `SET key value` into an expiry instant.
fn parse_set_options(options: &[Bytes]) -> Result<Option<Instant>, Reply> {
    let mut expires_at = None;

    let mut i = 0;
    while i < options.len() {
        if !options[i].eq_ignore_ascii_case(b"PX") {
            return Err(syntax_error());
        }

        let raw = options.get(i + 1).ok_or_else(syntax_error)?;
        let millis = parse_integer(raw).ok_or_else(not_an_integer)?;
        expires_at = Some(deadline_after(millis).ok_or_else(|| {
            Reply::error("ERR invalid expire time in 'set' command")
        })?);

        i += 2;
    }

    Ok(expires_at)
}

/// Absolute expiry for a relative TTL in milliseconds.
///
/// Zero or negative TTLs expire at "now", so the next read sees the key as
/// already gone.
fn deadline_after(millis: i64) -> Option<Instant> {
    let now = Instant::now();
    if millis <= 0 {
        return Some(now);
    }
    now.checked_add(Duration::from_millis(millis as u64))
}

/// Parses a base-10 signed integer argument.
fn parse_integer(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

fn syntax_error() -> Reply {
    Reply::error("ERR syntax error")
}

fn not_an_integer() -> Reply {
    Reply::error("ERR value is not an integer or out of range")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[test]
    fn test_echo_is_binary_safe() {
        let storage = StorageEngine::new();
        let payload = Bytes::from_static(b"\x00\r\n\xff");
        assert_eq!(
            echo(&storage, &[payload.clone()]),
            Reply::bulk_string(payload)
        );
    }

    #[test]
    fn test_set_options_px() {
        let before = Instant::now();
        let expires_at = parse_set_options(&args(&["px", "1000"])).unwrap().unwrap();
        assert!(expires_at >= before + Duration::from_millis(1000));
    }

    #[test]
    fn test_set_options_none() {
        assert_eq!(parse_set_options(&[]).unwrap(), None);
    }

    #[test]
    fn test_set_options_px_zero_expires_now() {
        let expires_at = parse_set_options(&args(&["PX", "0"])).unwrap().unwrap();
        assert!(expires_at <= Instant::now());
    }

    #[test]
    fn test_set_options_negative_px_expires_now() {
        let expires_at = parse_set_options(&args(&["PX", "-5"])).unwrap().unwrap();
        assert!(expires_at <= Instant::now());
    }

    #[test]
    fn test_set_options_errors() {
        assert_eq!(parse_set_options(&args(&["PX"])), Err(syntax_error()));
        assert_eq!(parse_set_options(&args(&["EX", "10"])), Err(syntax_error()));
        assert_eq!(
            parse_set_options(&args(&["PX", "soon"])),
            Err(not_an_integer())
        );
        assert_eq!(
            parse_set_options(&args(&["PX", "1.5"])),
            Err(not_an_integer())
        );
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer(b"42"), Some(42));
        assert_eq!(parse_integer(b"-1"), Some(-1));
        assert_eq!(parse_integer(b""), None);
        assert_eq!(parse_integer(b"\xff"), None);
    }
}
