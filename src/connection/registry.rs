//! Registry of live client connections.
//!
//! Every connection task registers itself on start and holds a
//! [`ConnectionGuard`]; dropping the guard (normal exit, error, or the task
//! being aborted at shutdown) removes the entry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifier assigned to each accepted connection, unique per registry.
pub type ConnectionId = u64;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Connections turned away by the client limit
    pub connections_rejected: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Tracks which connections are currently open.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    active: Mutex<HashMap<ConnectionId, SocketAddr>>,
    stats: ConnectionStats,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> MutexGuard<'_, HashMap<ConnectionId, SocketAddr>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new connection. It stays registered until the guard drops.
    pub fn register(self: &Arc<Self>, addr: SocketAddr) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.active().insert(id, addr);
        self.stats.connections_accepted.fetch_add(1, Ordering::Relaxed);

        ConnectionGuard {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Number of connections currently open.
    pub fn active_count(&self) -> usize {
        self.active().len()
    }

    /// Snapshot of open connections, ordered by id.
    pub fn connections(&self) -> Vec<(ConnectionId, SocketAddr)> {
        let mut connections: Vec<_> = self
            .active()
            .iter()
            .map(|(&id, &addr)| (id, addr))
            .collect();
        connections.sort_unstable_by_key(|&(id, _)| id);
        connections
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    fn deregister(&self, id: ConnectionId) {
        self.active().remove(&id);
    }
}

/// Keeps a connection registered while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_register_and_drop() {
        let registry = Arc::new(ConnectionRegistry::new());

        let first = registry.register(addr(5001));
        let second = registry.register(addr(5002));
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.active_count(), 2);
        assert_eq!(
            registry.connections(),
            vec![(first.id(), addr(5001)), (second.id(), addr(5002))]
        );

        drop(first);
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.connections(), vec![(second.id(), addr(5002))]);

        drop(second);
        assert_eq!(registry.active_count(), 0);
        let accepted = registry.stats().connections_accepted.load(Ordering::Relaxed);
        assert_eq!(accepted, 2);
    }

    #[test]
    fn test_stats_counters() {
        let stats = ConnectionStats::new();

        stats.command_processed();
        stats.command_processed();
        stats.bytes_read(10);
        stats.bytes_written(7);
        stats.connection_rejected();

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 10);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 7);
        assert_eq!(stats.connections_rejected.load(Ordering::Relaxed), 1);
    }
}
