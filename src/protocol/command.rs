//! Command definitions
//!
//! Represents requests from clients and from the peer server.

/// Three-byte ASCII command tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTag {
    /// Client insert
    Kvi,
    /// Client get
    Kvg,
    /// Client delete
    Kvd,
    /// Replicated insert (primary to backup)
    Pvi,
    /// Replicated delete (primary to backup)
    Pvd,
    /// Raw log dump shipped between the pair
    Dor,
}

impl CommandTag {
    pub fn as_bytes(&self) -> &'static [u8; 3] {
        match self {
            CommandTag::Kvi => b"KVI",
            CommandTag::Kvg => b"KVG",
            CommandTag::Kvd => b"KVD",
            CommandTag::Pvi => b"PVI",
            CommandTag::Pvd => b"PVD",
            CommandTag::Dor => b"DOR",
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"KVI" => Some(CommandTag::Kvi),
            b"KVG" => Some(CommandTag::Kvg),
            b"KVD" => Some(CommandTag::Kvd),
            b"PVI" => Some(CommandTag::Pvi),
            b"PVD" => Some(CommandTag::Pvd),
            b"DOR" => Some(CommandTag::Dor),
            _ => None,
        }
    }
}

/// Position of a replicated message in the primary's outbound stream
///
/// `session` changes every time a primary starts its gateway, so a restarted
/// primary's counter does not collide with the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub session: u64,
    pub seq: u64,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert a key-value pair if the key is absent
    Insert { key: i32, value: i32 },

    /// Get a value by key
    Get { key: i32 },

    /// Delete a key
    Delete { key: i32 },

    /// Insert forwarded by the primary
    ReplicatedInsert {
        key: i32,
        value: i32,
        sequence: Option<Sequence>,
    },

    /// Delete forwarded by the primary
    ReplicatedDelete {
        key: i32,
        sequence: Option<Sequence>,
    },

    /// Raw log bytes to replay
    LogDump { bytes: Vec<u8> },
}

impl Command {
    /// Get the command tag
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::Insert { .. } => CommandTag::Kvi,
            Command::Get { .. } => CommandTag::Kvg,
            Command::Delete { .. } => CommandTag::Kvd,
            Command::ReplicatedInsert { .. } => CommandTag::Pvi,
            Command::ReplicatedDelete { .. } => CommandTag::Pvd,
            Command::LogDump { .. } => CommandTag::Dor,
        }
    }
}
