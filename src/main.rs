//! EmberKV server binary.
//!
//! Parses the command line, sets up logging, binds the listener and runs the
//! accept loop until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use emberkv::config::Config;
use emberkv::server;
use emberkv::storage::StorageEngine;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
EmberKV v{} - In-Memory Key-Value Server
──────────────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        emberkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let storage = Arc::new(StorageEngine::new());
    info!("Storage engine initialized");

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    print_banner(&config);

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let registry = server::run(
        listener,
        Arc::clone(&storage),
        config.server_options(),
        shutdown,
    )
    .await;

    let stats = storage.stats();
    let connections = registry.stats();
    info!(
        keys = stats.keys,
        gets = stats.gets,
        sets = stats.sets,
        deletes = stats.deletes,
        expired = stats.expired,
        "Storage statistics"
    );
    info!(
        accepted = connections.connections_accepted.load(Ordering::Relaxed),
        rejected = connections.connections_rejected.load(Ordering::Relaxed),
        commands = connections.commands_processed.load(Ordering::Relaxed),
        bytes_read = connections.bytes_read.load(Ordering::Relaxed),
        bytes_written = connections.bytes_written.load(Ordering::Relaxed),
        "Connection statistics"
    );
    info!("Server shutdown complete");

    Ok(())
}
