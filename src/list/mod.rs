//! List Module
//!
//! The concurrent ordered set holding every live key/value mapping.
//!
//! ## Responsibilities
//! - Lock-free lookups
//! - Insert/delete with per-node locks and post-lock validation
//! - Logical (mark) then physical (unlink) deletion
//! - Safe reclamation of unlinked nodes
//!
//! ## Data Structure Choice
//! A lazy list (optimistic traversal + lock coupling):
//! - Mutations on disjoint key regions proceed in parallel
//! - A mutation holds at most two node locks, always predecessor first
//! - Unlinked nodes are reclaimed through `crossbeam::epoch`, so a reader
//!   still walking a removed node never touches freed memory

mod lazy_list;

pub use lazy_list::LazyList;

/// Liveness of a node, stored beside its `next` link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    /// Present in the set
    Live = 0,

    /// Removed; the node may still be reachable by in-flight traversals
    LogicallyDeleted = 1,
}

impl NodeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => NodeState::Live,
            _ => NodeState::LogicallyDeleted,
        }
    }
}
