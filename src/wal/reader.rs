//! Log Reader
//!
//! Walks a byte image of a log (file contents or a `DOR` blob) record by
//! record.

use super::entry::{LogRecord, RECORD_SIZE};

/// Reads records from an in-memory log image
///
/// Resynchronization is best-effort: a record with an unknown tag is counted
/// as corrupted and the reader skips one full record stride. A trailing
/// fragment shorter than a record ends the walk.
pub struct LogReader<'a> {
    bytes: &'a [u8],
    position: usize,
    corrupted: u64,
}

impl<'a> LogReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            corrupted: 0,
        }
    }

    /// Read the next valid record, skipping corrupted strides
    pub fn next_record(&mut self) -> Option<LogRecord> {
        while self.bytes.len() - self.position >= RECORD_SIZE {
            let start = self.position;
            self.position += RECORD_SIZE;

            match LogRecord::decode(&self.bytes[start..self.position]) {
                Ok(record) => return Some(record),
                Err(e) => {
                    tracing::warn!("Skipping record at offset {}: {}", start, e);
                    self.corrupted += 1;
                }
            }
        }
        None
    }

    /// Byte offset just past the last whole record consumed
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of strides skipped because of an unknown tag
    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }

    /// Whether a partial record trails the last whole one
    pub fn has_partial_tail(&self) -> bool {
        self.bytes.len() % RECORD_SIZE != 0
    }

    /// Length of the image rounded down to whole records
    pub fn aligned_len(&self) -> usize {
        self.bytes.len() - self.bytes.len() % RECORD_SIZE
    }
}

impl<'a> Iterator for LogReader<'a> {
    type Item = LogRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

/// Split a log image into pieces of at most `max_bytes`, cut on record
/// boundaries
///
/// Each piece except the last is a whole number of records; a limit below
/// one record still yields one record per piece.
pub fn record_chunks(bytes: &[u8], max_bytes: usize) -> std::slice::Chunks<'_, u8> {
    let stride = (max_bytes - max_bytes % RECORD_SIZE).max(RECORD_SIZE);
    bytes.chunks(stride)
}
