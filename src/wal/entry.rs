//! Log record definitions
//!
//! Defines the fixed-width on-disk unit for one committed mutation.

use crate::error::{KvError, Result};

/// Width of the ASCII operation tag
pub const TAG_SIZE: usize = 8;

/// Full record width: tag (8) + key (4) + value (4)
pub const RECORD_SIZE: usize = 16;

/// Tag of an insert record
pub const INSERT_TAG: &[u8; TAG_SIZE] = b"KVINSERT";

/// Tag of a delete record
pub const DELETE_TAG: &[u8; TAG_SIZE] = b"KVDELETE";

/// A single committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecord {
    /// A key/value mapping was created
    Insert { key: i32, value: i32 },

    /// A key was removed
    Delete { key: i32 },
}

impl LogRecord {
    pub fn key(&self) -> i32 {
        match *self {
            LogRecord::Insert { key, .. } | LogRecord::Delete { key } => key,
        }
    }

    /// Encode to the 16-byte on-disk layout (little-endian integers)
    ///
    /// Delete records carry four zero bytes in the value slot.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let (tag, key, value) = match *self {
            LogRecord::Insert { key, value } => (INSERT_TAG, key, value),
            LogRecord::Delete { key } => (DELETE_TAG, key, 0),
        };

        let mut buf = [0u8; RECORD_SIZE];
        buf[..TAG_SIZE].copy_from_slice(tag);
        buf[TAG_SIZE..TAG_SIZE + 4].copy_from_slice(&key.to_le_bytes());
        buf[TAG_SIZE + 4..].copy_from_slice(&value.to_le_bytes());
        buf
    }

    /// Decode one record from the start of `bytes`
    ///
    /// The value slot of a delete record is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_SIZE {
            return Err(KvError::LogCorruption(format!(
                "Incomplete record: expected {} bytes, got {}",
                RECORD_SIZE,
                bytes.len()
            )));
        }

        let key = i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let value = i32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        match &bytes[..TAG_SIZE] {
            tag if tag == INSERT_TAG => Ok(LogRecord::Insert { key, value }),
            tag if tag == DELETE_TAG => Ok(LogRecord::Delete { key }),
            tag => Err(KvError::LogCorruption(format!(
                "Unknown record tag: {:?}",
                String::from_utf8_lossy(tag)
            ))),
        }
    }
}
