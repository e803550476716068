//! LazyKV Server Binary
//!
//! Starts a primary or backup server.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use lazykv::config::WalSyncStrategy;
use lazykv::network::Server;
use lazykv::{Config, Engine, Role};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Primary,
    Backup,
}

/// LazyKV Server
#[derive(Parser, Debug)]
#[command(name = "lazykv-server")]
#[command(about = "Replicated key-value store on a concurrent lazy list")]
#[command(version)]
struct Args {
    /// Host to listen on
    #[arg(short, long, default_value = "127.0.0.1")]
    server_name: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Log file persisting the list
    #[arg(short, long, default_value = "./lazykv.log")]
    file: String,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Replication role
    #[arg(long, value_enum, default_value = "primary")]
    role: RoleArg,

    /// Backup address (host:port), primary only
    #[arg(long)]
    backup: Option<String>,

    /// Primary address (host:port), backup only
    #[arg(long)]
    primary: Option<String>,

    /// fsync every N appends instead of every append
    #[arg(long)]
    sync_every: Option<usize>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lazykv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let role = match args.role {
        RoleArg::Primary => Role::Primary {
            backup_addr: args.backup.clone(),
        },
        RoleArg::Backup => Role::Backup {
            primary_addr: args.primary.clone(),
        },
    };
    let sync = match args.sync_every {
        Some(count) if count > 1 => WalSyncStrategy::EveryNEntries { count },
        _ => WalSyncStrategy::EveryWrite,
    };

    tracing::info!("LazyKV Server v{}", lazykv::VERSION);
    tracing::info!("Log file: {}", args.file);
    tracing::info!("Role: {:?}", role);

    let config = Config::builder()
        .data_file(&args.file)
        .listen_addr(format!("{}:{}", args.server_name, args.port))
        .worker_threads(args.threads)
        .wal_sync_strategy(sync)
        .role(role)
        .build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received");
        shutdown.shutdown();
    }) {
        tracing::warn!("Failed to install signal handler: {}", e);
    }

    if let Err(e) = engine.sync_with_peer() {
        tracing::warn!("Startup sync with peer failed: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    drop(server);
    match Arc::try_unwrap(engine) {
        Ok(engine) => {
            if let Err(e) = engine.close() {
                tracing::error!("Failed to close engine: {}", e);
            }
        }
        Err(_) => tracing::warn!("Engine still shared at exit; skipping close"),
    }

    tracing::info!("Server stopped");
}
