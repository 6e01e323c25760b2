//! Thread-Safe Storage Engine with Lazy Expiry
//!
//! This module implements the key-value store shared by every connection.
//!
//! ## Design Decisions
//!
//! 1. **One Coarse Lock**: A single `Mutex` guards the whole keyspace. Every
//!    operation (including multi-key DEL/EXISTS) runs in one critical section.
//! 2. **Two Views, One Entry Set**: Values and expiry instants live in two maps
//!    that are always updated together.
//! 3. **Lazy Expiry Only**: An expired key is removed when GET, EXISTS or DEL
//!    next touches it. Nothing scans the keyspace in the background, so an
//!    expired key that is never touched again keeps its memory.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              StorageEngine              │
//! │  ┌───────────────────────────────────┐  │
//! │  │          Mutex<Keyspace>          │  │
//! │  │  values:   HashMap<Bytes, Bytes>  │  │
//! │  │  expiries: HashMap<Bytes, Instant>│  │
//! │  └───────────────────────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// The two lockstep views of the entry set.
#[derive(Debug, Default)]
struct Keyspace {
    values: HashMap<Bytes, Bytes>,
    expiries: HashMap<Bytes, Instant>,
}

impl Keyspace {
    /// An entry whose expiry is at or before `now` is expired.
    #[inline]
    fn is_expired(&self, key: &[u8], now: Instant) -> bool {
        self.expiries.get(key).is_some_and(|&at| at <= now)
    }

    /// Removes both views of `key`. Returns whether a value was present.
    fn remove(&mut self, key: &[u8]) -> bool {
        self.expiries.remove(key);
        self.values.remove(key).is_some()
    }

    /// Evicts `key` if it has expired. Returns whether an eviction happened.
    fn evict_if_expired(&mut self, key: &[u8], now: Instant) -> bool {
        if self.is_expired(key, now) {
            self.remove(key);
            true
        } else {
            false
        }
    }
}

/// Point-in-time statistics for the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStats {
    /// Entries physically held, including expired ones not yet evicted
    pub keys: usize,
    /// Keys carrying an expiry
    pub volatile_keys: usize,
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Keys removed by lazy expiry
    pub expired: u64,
}

/// The key-value store shared by all client connections.
///
/// # Thread Safety
///
/// Wrap it in an `Arc` and hand a clone to each connection. All operations
/// take `&self`.
///
/// # Example
///
/// ```
/// use emberkv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"), None);
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
///
/// let keys = [Bytes::from("name"), Bytes::from("missing")];
/// assert_eq!(engine.exists_count(&keys), 1);
/// assert_eq!(engine.delete(&keys), 1);
/// ```
#[derive(Debug, Default)]
pub struct StorageEngine {
    keyspace: Mutex<Keyspace>,

    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the keyspace lock.
    ///
    /// A panic while holding the lock cannot leave the two maps out of step
    /// (every mutation is a single insert/remove pair), so a poisoned lock is
    /// still safe to use.
    fn keyspace(&self) -> MutexGuard<'_, Keyspace> {
        self.keyspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// `expires_at` sets the absolute expiry instant; `None` clears any expiry
    /// the key had before.
    pub fn set(&self, key: Bytes, value: Bytes, expires_at: Option<Instant>) {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut keyspace = self.keyspace();
        match expires_at {
            Some(at) => {
                keyspace.expiries.insert(key.clone(), at);
            }
            None => {
                keyspace.expiries.remove(&key);
            }
        }
        keyspace.values.insert(key, value);
    }

    /// Stores `value` under `key` with a time-to-live relative to now.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) {
        self.set(key, value, Some(Instant::now() + ttl));
    }

    /// Returns the value for `key`.
    ///
    /// An expired key is evicted and reported as absent.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let mut keyspace = self.keyspace();
        if keyspace.evict_if_expired(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        keyspace.values.get(key).cloned()
    }

    /// Counts how many of `keys` are present and not expired.
    ///
    /// Expired keys encountered are evicted. A key listed twice counts twice.
    pub fn exists_count(&self, keys: &[Bytes]) -> u64 {
        let now = Instant::now();
        let mut keyspace = self.keyspace();
        let mut count = 0;
        for key in keys {
            if keyspace.evict_if_expired(key, now) {
                self.expired_count.fetch_add(1, Ordering::Relaxed);
            } else if keyspace.values.contains_key(key.as_ref()) {
                count += 1;
            }
        }
        count
    }

    /// Removes each of `keys` and returns how many were present.
    ///
    /// Presence is judged on the value map alone: a key that has expired but
    /// has not been evicted yet still counts as removed.
    pub fn delete(&self, keys: &[Bytes]) -> u64 {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut keyspace = self.keyspace();
        keys.iter().filter(|key| keyspace.remove(key)).count() as u64
    }

    /// Number of entries physically held, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.keyspace().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageStats {
        let (keys, volatile_keys) = {
            let keyspace = self.keyspace();
            (keyspace.values.len(), keyspace.expiries.len())
        };

        StorageStats {
            keys,
            volatile_keys,
            gets: self.get_count.load(Ordering::Relaxed),
            sets: self.set_count.load(Ordering::Relaxed),
            deletes: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}
