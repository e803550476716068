//! Configuration for LazyKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::protocol::MAX_BODY_SIZE;

/// Main configuration for a LazyKV server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Append-only log file holding every committed mutation
    pub data_file: PathBuf,

    /// Sync strategy: how often to fsync the log
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Number of worker threads serving connections
    pub worker_threads: usize,

    // -------------------------------------------------------------------------
    // Replication Configuration
    // -------------------------------------------------------------------------
    /// Primary or backup, fixed for the lifetime of the process
    pub role: Role,

    /// Backoff between delivery attempts to an unreachable peer (milliseconds)
    pub replication_retry_ms: u64,

    /// Largest `DOR` body sent to the peer; longer logs go out in several
    /// record-aligned pieces
    pub max_dump_chunk: usize,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every append; a mutation is durable before it is acknowledged
    EveryWrite,

    /// fsync after N unsynced appends (trades durability for throughput)
    EveryNEntries { count: usize },
}

/// Replication role of a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Accepts client writes and forwards them to `backup_addr` when set
    Primary { backup_addr: Option<String> },

    /// Serves reads; accepts writes only through replication or log recovery.
    /// `primary_addr` is where the startup log dump is sent.
    Backup { primary_addr: Option<String> },
}

impl Role {
    pub fn is_backup(&self) -> bool {
        matches!(self, Role::Backup { .. })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("./lazykv.log"),
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            listen_addr: "127.0.0.1:8080".to_string(),
            worker_threads: 4,
            role: Role::Primary { backup_addr: None },
            replication_retry_ms: 500,
            max_dump_chunk: MAX_BODY_SIZE as usize,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the log file path
    pub fn data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_file = path.into();
        self
    }

    /// Set the log sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the worker pool size
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the replication role
    pub fn role(mut self, role: Role) -> Self {
        self.config.role = role;
        self
    }

    /// Set the replication retry backoff (in milliseconds)
    pub fn replication_retry_ms(mut self, ms: u64) -> Self {
        self.config.replication_retry_ms = ms;
        self
    }

    /// Set the largest `DOR` body (clamped to the protocol maximum)
    pub fn max_dump_chunk(mut self, bytes: usize) -> Self {
        self.config.max_dump_chunk = bytes.min(MAX_BODY_SIZE as usize);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
