//! Replication Module
//!
//! Keeps the backup's list converging to the primary's.
//!
//! ## Responsibilities
//! - Primary: queue every committed mutation and deliver it to the backup
//!   as `PVI`/`PVD`, in commit order, retrying while the backup is down
//! - Backup: apply each replicated message once, keyed by its sequence
//! - Both: ship a whole log as `DOR` when a node starts with history

mod gateway;

pub use gateway::{Outbound, ReplicationGateway};

use crate::protocol::Sequence;

/// Last replicated message applied on a backup
///
/// A message is a duplicate when it belongs to the current session and its
/// seq is not above the last applied one. A new session resets the cursor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplicaCursor {
    last: Option<Sequence>,
}

impl ReplicaCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, sequence: Sequence) -> bool {
        match self.last {
            Some(last) => last.session == sequence.session && sequence.seq <= last.seq,
            None => false,
        }
    }

    pub fn advance(&mut self, sequence: Sequence) {
        self.last = Some(sequence);
    }

    pub fn last_applied(&self) -> Option<Sequence> {
        self.last
    }
}
