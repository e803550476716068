//! Durability Log Module
//!
//! Provides durability through an append-only record log.
//!
//! ## Responsibilities
//! - Append a record for every committed mutation, synced before the
//!   mutation is acknowledged
//! - Replay the log at startup
//! - Decode log dumps shipped between primary and backup
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌──────────────┬─────────┬───────────┐  │
//! │ │ Tag (8)      │ Key (4) │ Value (4) │  │
//! │ └──────────────┴─────────┴───────────┘  │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```
//! Tags are `KVINSERT` / `KVDELETE`; integers are little-endian; a delete
//! stores zero as its value. No length prefix, no checksum.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{LogRecord, DELETE_TAG, INSERT_TAG, RECORD_SIZE, TAG_SIZE};
pub use writer::{LogSink, LogWriter};
pub use reader::{record_chunks, LogReader};
pub use recovery::{LogRecovery, RecoveryResult};
