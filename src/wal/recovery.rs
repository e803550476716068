//! Log Recovery
//!
//! Reads a log back into records on startup or when a peer ships a dump.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::Result;

use super::{LogReader, LogRecord};

/// Handles log recovery after a restart
pub struct LogRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records decoded
    pub records_recovered: u64,

    /// Number of 16-byte strides skipped for an unknown tag
    pub records_corrupted: u64,

    /// Whether a partial trailing record was found (and cut, for files)
    pub was_truncated: bool,
}

impl LogRecovery {
    /// Recover records from a log file
    ///
    /// A missing file is an empty log. A partial trailing record is cut off
    /// so later appends stay record-aligned.
    pub fn recover(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult)> {
        if !path.exists() {
            return Ok((Vec::new(), RecoveryResult::default()));
        }

        let bytes = fs::read(path)?;
        let (records, result) = Self::decode(&bytes);

        if result.was_truncated {
            let aligned = LogReader::new(&bytes).aligned_len();
            tracing::warn!(
                "Cutting partial record off {}: {} -> {} bytes",
                path.display(),
                bytes.len(),
                aligned
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(aligned as u64)?;
            file.sync_all()?;
        }

        Ok((records, result))
    }

    /// Decode every record in an in-memory log image
    pub fn decode(bytes: &[u8]) -> (Vec<LogRecord>, RecoveryResult) {
        let mut reader = LogReader::new(bytes);
        let records: Vec<LogRecord> = reader.by_ref().collect();

        let result = RecoveryResult {
            records_recovered: records.len() as u64,
            records_corrupted: reader.corrupted(),
            was_truncated: reader.has_partial_tail(),
        };

        (records, result)
    }
}
