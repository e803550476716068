//! Log Writer
//!
//! Handles appending records to the log file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::config::WalSyncStrategy;
use crate::error::{KvError, Result};

use super::{LogRecord, RECORD_SIZE};

/// Storage underneath a [`LogWriter`]
///
/// Implemented for `File`; tests can supply a sink that fails on demand.
pub trait LogSink: Write {
    /// Force written bytes to stable storage
    fn sync_data(&mut self) -> io::Result<()>;

    /// Current length in bytes
    fn size(&mut self) -> io::Result<u64>;

    /// Cut the sink back to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Whole contents, from the first byte
    fn read_all(&mut self) -> io::Result<Vec<u8>>;
}

impl LogSink for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        // Appends always land at the end, so moving the cursor is harmless.
        self.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Appends records to the log file
///
/// Not synchronized; the engine keeps it behind a mutex.
///
/// A failed append is rolled back to the previous record boundary, so the
/// file never keeps a record whose mutation was refused. If the rollback
/// itself fails the writer is poisoned and refuses every later append.
pub struct LogWriter<S: LogSink = File> {
    sink: S,
    sync_strategy: WalSyncStrategy,
    /// Length of the log after the last successful append
    len: u64,
    /// Appends since the last fsync
    unsynced: usize,
    /// Appends through this writer
    records_written: u64,
    poisoned: bool,
}

impl LogWriter<File> {
    /// Open or create a log file in append mode
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        Self::with_sink(file, sync_strategy)
    }
}

impl<S: LogSink> LogWriter<S> {
    /// Wrap an already opened sink; appends continue after its current end
    pub fn with_sink(mut sink: S, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let len = sink.size()?;

        Ok(Self {
            sink,
            sync_strategy,
            len,
            unsynced: 0,
            records_written: 0,
            poisoned: false,
        })
    }

    /// Append one record
    ///
    /// With `WalSyncStrategy::EveryWrite` the record is on stable storage
    /// when this returns. On error nothing of the record is left in the log.
    pub fn append(&mut self, record: &LogRecord) -> Result<()> {
        if self.poisoned {
            return Err(KvError::LogCorruption(
                "log writer disabled after a failed rollback".to_string(),
            ));
        }

        let start = self.len;
        match self.write_record(record) {
            Ok(()) => {
                self.len = start + RECORD_SIZE as u64;
                self.records_written += 1;
                Ok(())
            }
            Err(e) => {
                self.rollback(start);
                Err(e)
            }
        }
    }

    fn write_record(&mut self, record: &LogRecord) -> Result<()> {
        self.sink.write_all(&record.encode())?;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(())
    }

    fn rollback(&mut self, len: u64) {
        let result = self
            .sink
            .truncate(len)
            .and_then(|_| self.sink.sync_data());

        match result {
            Ok(()) => tracing::warn!("Log append failed; rolled back to {} bytes", len),
            Err(e) => {
                tracing::error!("Log rollback to {} bytes failed: {}; refusing further appends", len, e);
                self.poisoned = true;
            }
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.sink.flush()?;
        self.sink.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Read back the whole log (synced first so the image is complete)
    pub fn contents(&mut self) -> Result<Vec<u8>> {
        self.sync()?;
        Ok(self.sink.read_all()?)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Whether a failed rollback has disabled this writer
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}
