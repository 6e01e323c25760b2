//! TCP accept loop and connection supervision.
//!
//! Every accepted connection runs in its own task inside a `JoinSet` owned by
//! the listener, so the server always holds a handle to each one. When the
//! shutdown future completes the listener stops accepting and aborts the
//! remaining connection tasks.

use crate::commands::Dispatcher;
use crate::connection::{handle_connection, ConnectionRegistry, INITIAL_BUFFER_SIZE};
use crate::storage::StorageEngine;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Reply sent to a client turned away by the connection limit.
const MAX_CLIENTS_REPLY: &[u8] = b"-ERR max number of clients reached\r\n";

/// Tunables for the accept loop and its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Maximum simultaneous clients, `None` for unlimited
    pub max_clients: Option<usize>,
    /// Initial read buffer capacity per connection
    pub buffer_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_clients: None,
            buffer_size: INITIAL_BUFFER_SIZE,
        }
    }
}

/// Accepts connections and supervises their tasks.
struct Listener {
    listener: TcpListener,
    dispatcher: Dispatcher,
    registry: Arc<ConnectionRegistry>,
    limit: Option<Arc<Semaphore>>,
    options: ServerOptions,
    connections: JoinSet<()>,
}

/// Runs the server on `listener` until `shutdown` completes.
///
/// Returns the connection registry so callers can inspect the final
/// counters.
pub async fn run(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    options: ServerOptions,
    shutdown: impl Future,
) -> Arc<ConnectionRegistry> {
    let registry = Arc::new(ConnectionRegistry::new());
    let mut server = Listener {
        listener,
        dispatcher: Dispatcher::new(storage),
        registry: Arc::clone(&registry),
        limit: options.max_clients.map(|max| Arc::new(Semaphore::new(max))),
        options,
        connections: JoinSet::new(),
    };

    tokio::select! {
        _ = server.accept_loop() => {}
        _ = shutdown => {
            info!("Shutdown signal received, stopping server...");
        }
    }

    let open = registry.connections();
    if !open.is_empty() {
        info!(connections = open.len(), "Closing open connections");
        for (id, addr) in &open {
            debug!(id = *id, client = %addr, "Closing connection");
        }
    }
    server.connections.shutdown().await;

    registry
}

impl Listener {
    /// Main loop that accepts incoming connections.
    ///
    /// Accept failures are logged and the loop keeps serving.
    async fn accept_loop(&mut self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Listening on {}", addr);
        }

        loop {
            self.reap_finished();

            match self.listener.accept().await {
                Ok((stream, addr)) => self.spawn_connection(stream, addr),
                Err(e) => error!("Failed to accept connection: {}", e),
            }
        }
    }

    fn spawn_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let permit = match self.try_acquire_slot() {
            Ok(permit) => permit,
            Err(()) => {
                warn!(client = %addr, "Connection limit reached, rejecting client");
                self.registry.stats().connection_rejected();
                self.connections.spawn(reject(stream, addr));
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        let dispatcher = self.dispatcher.clone();
        let registry = Arc::clone(&self.registry);
        let buffer_size = self.options.buffer_size;

        self.connections.spawn(async move {
            let _permit = permit;
            handle_connection(stream, addr, dispatcher, registry, buffer_size).await;
        });
    }

    /// Takes one client slot when a limit is configured.
    fn try_acquire_slot(&self) -> Result<Option<OwnedSemaphorePermit>, ()> {
        match &self.limit {
            Some(semaphore) => Arc::clone(semaphore)
                .try_acquire_owned()
                .map(Some)
                .map_err(|_| ()),
            None => Ok(None),
        }
    }

    /// Drops handles of connection tasks that have already finished.
    fn reap_finished(&mut self) {
        while let Some(result) = self.connections.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "Connection task panicked");
                }
            }
        }
    }
}

async fn reject(mut stream: TcpStream, addr: SocketAddr) {
    if let Err(e) = stream.write_all(MAX_CLIENTS_REPLY).await {
        debug!(client = %addr, error = %e, "Failed to send rejection");
        return;
    }
    if let Err(e) = stream.shutdown().await {
        debug!(client = %addr, error = %e, "Shutdown failed");
    }
}
