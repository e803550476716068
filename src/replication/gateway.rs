//! Replication Gateway
//!
//! Primary-side outbound queue to the backup. Mutations are enqueued from
//! the request path and delivered by a single background thread, in order,
//! retrying until the backup acknowledges them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{self, Receiver, Sender};

use crate::client::Client;
use crate::error::{KvError, Result};
use crate::protocol::{Command, Response, Sequence, MAX_BODY_SIZE};
use crate::wal::{record_chunks, LogRecord};

/// A committed mutation (or a whole log) waiting for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Insert { key: i32, value: i32 },
    Delete { key: i32 },
    LogDump(Vec<u8>),
}

impl From<LogRecord> for Outbound {
    fn from(record: LogRecord) -> Self {
        match record {
            LogRecord::Insert { key, value } => Outbound::Insert { key, value },
            LogRecord::Delete { key } => Outbound::Delete { key },
        }
    }
}

#[derive(Debug, Default)]
struct GatewayStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Forwards committed mutations to the backup
///
/// ## Ordering:
/// - One channel, one delivery thread: messages reach the backup in
///   enqueue order
/// - Sequence numbers are assigned at delivery time, so they increase in
///   exactly that order and a retried message keeps its number
/// - A log dump longer than one request body goes out as consecutive
///   record-aligned `DOR` pieces; it counts as one message
pub struct ReplicationGateway {
    backup_addr: String,
    sender: Option<Sender<Outbound>>,
    worker: Option<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
    stats: Arc<GatewayStats>,
}

impl ReplicationGateway {
    /// Start the delivery thread for `backup_addr`
    pub fn start(backup_addr: impl Into<String>, retry: Duration) -> Result<Self> {
        Self::start_with(backup_addr, retry, MAX_BODY_SIZE as usize)
    }

    /// Start with an explicit upper bound on each `DOR` body
    pub fn start_with(
        backup_addr: impl Into<String>,
        retry: Duration,
        max_dump_chunk: usize,
    ) -> Result<Self> {
        let backup_addr = backup_addr.into();
        let (sender, receiver) = channel::unbounded();
        let stopping = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(GatewayStats::default());

        let worker = DeliveryWorker {
            client: Client::new(backup_addr.clone()),
            session: new_session_id(),
            next_seq: 1,
            retry,
            max_dump_chunk: max_dump_chunk.min(MAX_BODY_SIZE as usize),
            stopping: Arc::clone(&stopping),
            stats: Arc::clone(&stats),
        };

        tracing::info!(
            "Replication gateway to {} started (session {})",
            backup_addr,
            worker.session
        );

        let worker = thread::Builder::new()
            .name("replication".to_string())
            .spawn(move || worker.run(receiver))
            .map_err(|e| KvError::Replication(format!("Failed to spawn delivery thread: {}", e)))?;

        Ok(Self {
            backup_addr,
            sender: Some(sender),
            worker: Some(worker),
            stopping,
            stats,
        })
    }

    /// Queue a message for the backup; never blocks
    pub fn forward(&self, message: Outbound) {
        let Some(sender) = &self.sender else {
            return;
        };
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        if sender.send(message).is_err() {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Replication queue closed; message to {} dropped", self.backup_addr);
        }
    }

    /// Messages enqueued but not yet delivered or dropped
    pub fn pending(&self) -> u64 {
        let settled = self.delivered() + self.dropped();
        self.stats.enqueued.load(Ordering::Relaxed).saturating_sub(settled)
    }

    pub fn delivered(&self) -> u64 {
        self.stats.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    pub fn backup_addr(&self) -> &str {
        &self.backup_addr
    }

    /// Block until the queue is drained or `timeout` elapses
    ///
    /// Returns `true` if nothing is pending.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Stop accepting messages and join the delivery thread
    ///
    /// Queued messages get one more delivery attempt each; anything that
    /// still fails is dropped and counted.
    pub fn shutdown(&mut self) {
        self.stopping.store(true, Ordering::Release);
        self.sender = None;

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Replication delivery thread panicked");
            }
        }

        let dropped = self.dropped();
        if dropped > 0 {
            tracing::warn!("{} replication messages were never delivered", dropped);
        }
    }
}

impl Drop for ReplicationGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Delivery loop running on the gateway thread
struct DeliveryWorker {
    client: Client,
    session: u64,
    next_seq: u64,
    retry: Duration,
    max_dump_chunk: usize,
    stopping: Arc<AtomicBool>,
    stats: Arc<GatewayStats>,
}

/// Final outcome of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Dropped,
}

impl DeliveryWorker {
    fn run(mut self, receiver: Receiver<Outbound>) {
        for message in receiver.iter() {
            let outcome = match message {
                Outbound::Insert { key, value } => {
                    let command = Command::ReplicatedInsert {
                        key,
                        value,
                        sequence: Some(self.take_sequence()),
                    };
                    self.deliver(&command)
                }
                Outbound::Delete { key } => {
                    let command = Command::ReplicatedDelete {
                        key,
                        sequence: Some(self.take_sequence()),
                    };
                    self.deliver(&command)
                }
                Outbound::LogDump(bytes) => self.deliver_dump(&bytes),
            };

            let counter = match outcome {
                Delivery::Delivered => &self.stats.delivered,
                Delivery::Dropped => &self.stats.dropped,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!("Replication queue closed, delivery thread exiting");
    }

    /// Send a log image piece by piece; stops at the first dropped piece
    fn deliver_dump(&self, bytes: &[u8]) -> Delivery {
        let pieces = record_chunks(bytes, self.max_dump_chunk);
        let total = pieces.len();

        for (index, piece) in pieces.enumerate() {
            let command = Command::LogDump {
                bytes: piece.to_vec(),
            };
            if self.deliver(&command) == Delivery::Dropped {
                tracing::warn!(
                    "Log dump to {} abandoned after {} of {} pieces",
                    self.client.addr(),
                    index,
                    total
                );
                return Delivery::Dropped;
            }
        }

        Delivery::Delivered
    }

    fn take_sequence(&mut self) -> Sequence {
        let sequence = Sequence {
            session: self.session,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        sequence
    }

    fn deliver(&self, command: &Command) -> Delivery {
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;

            match self.client.request(command) {
                Ok(Response::Invalid) => {
                    tracing::warn!(
                        "Backup {} refused {:?}; is it running as a primary?",
                        self.client.addr(),
                        command.tag()
                    );
                    return Delivery::Dropped;
                }
                Ok(response) => {
                    tracing::trace!("Backup acknowledged {:?}: {:?}", command.tag(), response);
                    return Delivery::Delivered;
                }
                Err(e) => {
                    if self.stopping.load(Ordering::Acquire) {
                        tracing::warn!(
                            "Giving up on {:?} to {} during shutdown: {}",
                            command.tag(),
                            self.client.addr(),
                            e
                        );
                        return Delivery::Dropped;
                    }
                    if attempts == 1 || attempts % 20 == 0 {
                        tracing::warn!(
                            "Replication to {} failed (attempt {}): {}",
                            self.client.addr(),
                            attempts,
                            e
                        );
                    }
                    thread::sleep(self.retry);
                }
            }
        }
    }
}

fn new_session_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
        .max(1)
}
