//! Engine Module
//!
//! Owns the list, the log and the replication gateway, and routes every
//! parsed command to them.
//!
//! ## Responsibilities
//! - Replay the log into the list on startup
//! - Dispatch commands and enforce the primary/backup role
//! - Log (and, on the primary, forward) every mutation that takes effect
//! - Replay log dumps shipped by the peer

use std::fs;
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::Client;
use crate::config::{Config, Role};
use crate::error::Result;
use crate::list::LazyList;
use crate::protocol::{Command, Response, Sequence};
use crate::replication::{Outbound, ReplicaCursor, ReplicationGateway};
use crate::wal::{record_chunks, LogRecord, LogRecovery, LogWriter, RecoveryResult};

/// Where a mutation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// A client request on the primary; forwarded to the backup
    Client,
    /// A `PVI`/`PVD` from the primary
    Replication,
    /// A `DOR` log dump from the peer
    Recovery,
}

/// The storage engine
///
/// ## Concurrency Model
///
/// - **List**: per-node locks; disjoint key regions mutate in parallel
/// - **Log**: appended from inside the list's commit hook, so the record for
///   a mutation is written while the affected nodes are still locked. Two
///   mutations of the same key are therefore logged in apply order.
/// - **Gateway**: enqueue happens in the same hook, after the append
/// - **Replica cursor**: held across a whole replicated apply
///
/// Lock order is cursor → node locks → log, never the reverse.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// The key/value mappings
    list: LazyList,

    /// Append-only log (exclusive access needed)
    wal: Mutex<LogWriter>,

    /// Outbound queue to the backup (primary with a backup only)
    gateway: Option<ReplicationGateway>,

    /// Last replicated message applied (backup only)
    replica: Mutex<ReplicaCursor>,

    /// What startup recovery found
    recovery: RecoveryResult,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Recover records from the log file (missing file = empty)
    /// 2. Replay them into the list
    /// 3. Re-open the log for appending
    /// 4. Start the replication gateway on a primary with a backup
    pub fn open(config: Config) -> Result<Self> {
        if let Some(parent) = config.data_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let list = LazyList::new();

        let (records, recovery) = LogRecovery::recover(&config.data_file)?;
        if recovery.records_recovered > 0 || recovery.records_corrupted > 0 {
            tracing::info!(
                "Log recovery: {} records recovered, {} corrupted, truncated={}",
                recovery.records_recovered,
                recovery.records_corrupted,
                recovery.was_truncated
            );
        }

        for record in &records {
            match *record {
                LogRecord::Insert { key, value } => {
                    list.insert(key, value);
                }
                LogRecord::Delete { key } => {
                    list.delete(key);
                }
            }
        }

        let wal = LogWriter::open(&config.data_file, config.wal_sync_strategy)?;

        let gateway = match &config.role {
            Role::Primary {
                backup_addr: Some(addr),
            } => Some(ReplicationGateway::start_with(
                addr.clone(),
                Duration::from_millis(config.replication_retry_ms),
                config.max_dump_chunk,
            )?),
            _ => None,
        };

        tracing::info!(
            "Engine ready: {} keys, role={}",
            list.size(),
            if config.role.is_backup() { "backup" } else { "primary" }
        );

        Ok(Self {
            config,
            list,
            wal: Mutex::new(wal),
            gateway,
            replica: Mutex::new(ReplicaCursor::new()),
            recovery,
        })
    }

    /// Open a standalone primary on a log file (convenience method)
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_file(path).build();
        Self::open(config)
    }

    /// Execute a command
    ///
    /// Routes commands to the list; role violations come back as
    /// `Response::Invalid`, never as errors.
    pub fn execute(&self, command: Command) -> Result<Response> {
        let is_backup = self.config.role.is_backup();

        match command {
            Command::Get { key } => Ok(self.get(key)),

            Command::Insert { key, .. } | Command::Delete { key } if is_backup => {
                tracing::debug!("Backup rejecting direct mutation of key {}", key);
                Ok(Response::Invalid)
            }
            Command::Insert { key, value } => self.insert(key, value, Origin::Client),
            Command::Delete { key } => self.delete(key, Origin::Client),

            Command::ReplicatedInsert { key, .. } | Command::ReplicatedDelete { key, .. }
                if !is_backup =>
            {
                tracing::warn!("Primary received replicated mutation of key {}", key);
                Ok(Response::Invalid)
            }
            Command::ReplicatedInsert {
                key,
                value,
                sequence,
            } => self.apply_replicated(sequence, || self.insert(key, value, Origin::Replication)),
            Command::ReplicatedDelete { key, sequence } => {
                self.apply_replicated(sequence, || self.delete(key, Origin::Replication))
            }

            Command::LogDump { bytes } => {
                self.apply_log_dump(&bytes)?;
                Ok(Response::Ok)
            }
        }
    }

    /// Get a value by key
    pub fn get(&self, key: i32) -> Response {
        match self.list.find(key) {
            Some(value) => Response::Value(value),
            None => Response::ErrKey,
        }
    }

    /// Replay a log image shipped by the peer
    ///
    /// Records that take effect are appended to this node's log. Nothing is
    /// forwarded. There is no conflict resolution: the dump is applied in
    /// its own order on top of the current state.
    pub fn apply_log_dump(&self, bytes: &[u8]) -> Result<RecoveryResult> {
        let (records, result) = LogRecovery::decode(bytes);

        let mut applied = 0u64;
        for record in records {
            let changed = match record {
                LogRecord::Insert { key, value } => self
                    .list
                    .insert_with(key, value, || self.commit(record, Origin::Recovery))?,
                LogRecord::Delete { key } => self
                    .list
                    .delete_with(key, || self.commit(record, Origin::Recovery))?,
            };
            if changed {
                applied += 1;
            }
        }

        tracing::info!(
            "Applied log dump: {} records, {} took effect, {} corrupted strides",
            result.records_recovered,
            applied,
            result.records_corrupted
        );

        Ok(result)
    }

    /// Ship this node's log to its peer after startup
    ///
    /// - Backup with a non-empty log: sends it to the primary as one or more
    ///   record-aligned `DOR` requests, each at most `max_dump_chunk` bytes,
    ///   waiting for every answer (failures are logged, not returned)
    /// - Primary with a backup and a non-empty log: queues it on the gateway
    pub fn sync_with_peer(&self) -> Result<()> {
        match &self.config.role {
            Role::Backup {
                primary_addr: Some(addr),
            } => {
                let bytes = self.log_contents()?;
                if bytes.is_empty() {
                    return Ok(());
                }

                tracing::info!("Sending {} bytes of log to primary {}", bytes.len(), addr);
                let client = Client::new(addr.clone());
                for piece in record_chunks(&bytes, self.config.max_dump_chunk) {
                    let command = Command::LogDump {
                        bytes: piece.to_vec(),
                    };
                    match client.request(&command) {
                        Ok(response) => {
                            tracing::debug!("Primary answered log dump piece: {:?}", response)
                        }
                        Err(e) => {
                            tracing::warn!("Log dump to primary {} failed: {}", addr, e);
                            break;
                        }
                    }
                }
            }
            Role::Primary { .. } => {
                if let Some(gateway) = &self.gateway {
                    let bytes = self.log_contents()?;
                    if !bytes.is_empty() {
                        tracing::info!(
                            "Queueing {} bytes of log for backup {}",
                            bytes.len(),
                            gateway.backup_addr()
                        );
                        gateway.forward(Outbound::LogDump(bytes));
                    }
                }
            }
            Role::Backup { primary_addr: None } => {}
        }

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Drains the replication queue (one attempt per message) and syncs the log.
    pub fn close(mut self) -> Result<()> {
        if let Some(mut gateway) = self.gateway.take() {
            gateway.shutdown();
        }

        self.wal.lock().sync()?;
        Ok(())
    }

    // =========================================================================
    // Mutation Path
    // =========================================================================

    fn insert(&self, key: i32, value: i32, origin: Origin) -> Result<Response> {
        let record = LogRecord::Insert { key, value };
        let inserted = self
            .list
            .insert_with(key, value, || self.commit(record, origin))?;

        Ok(if inserted {
            Response::Ok
        } else {
            Response::ErrKey
        })
    }

    fn delete(&self, key: i32, origin: Origin) -> Result<Response> {
        let record = LogRecord::Delete { key };
        let deleted = self.list.delete_with(key, || self.commit(record, origin))?;

        Ok(if deleted {
            Response::Ok
        } else {
            Response::ErrKey
        })
    }

    /// Commit hook: runs under the list's node locks
    fn commit(&self, record: LogRecord, origin: Origin) -> Result<()> {
        self.wal.lock().append(&record)?;

        if origin == Origin::Client {
            if let Some(gateway) = &self.gateway {
                gateway.forward(record.into());
            }
        }

        Ok(())
    }

    /// Apply a `PVI`/`PVD` at most once per sequence
    ///
    /// A message the cursor has already seen is answered `OK` as a plain
    /// acknowledgement; its original outcome (possibly `ERR_KEY`) is not
    /// remembered.
    fn apply_replicated(
        &self,
        sequence: Option<Sequence>,
        apply: impl FnOnce() -> Result<Response>,
    ) -> Result<Response> {
        let mut cursor = self.replica.lock();

        if let Some(sequence) = sequence {
            if cursor.is_duplicate(sequence) {
                tracing::debug!("Skipping already applied replication message {:?}", sequence);
                return Ok(Response::Ok);
            }
        }

        let response = apply()?;

        if let Some(sequence) = sequence {
            cursor.advance(sequence);
        }

        Ok(response)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Full contents of the log file
    pub fn log_contents(&self) -> Result<Vec<u8>> {
        self.wal.lock().contents()
    }

    /// Number of live keys (advisory)
    pub fn len(&self) -> usize {
        self.list.size()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Live mappings in key order (advisory)
    pub fn entries(&self) -> Vec<(i32, i32)> {
        self.list.entries()
    }

    /// Records appended since this engine opened
    pub fn records_written(&self) -> u64 {
        self.wal.lock().records_written()
    }

    /// Startup recovery statistics
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Replication gateway, if this is a primary with a backup
    pub fn gateway(&self) -> Option<&ReplicationGateway> {
        self.gateway.as_ref()
    }

    /// Last replicated message applied
    pub fn last_replicated(&self) -> Option<Sequence> {
        self.replica.lock().last_applied()
    }

    pub fn role(&self) -> &Role {
        &self.config.role
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
