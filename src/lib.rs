//! # LazyKV
//!
//! A replicated key-value store with:
//! - A concurrent lazy list (lock coupling, validated mutation, mark-then-unlink
//!   deletion) as its only index
//! - An append-only log, synced before a mutation is acknowledged
//! - Primary/backup replication over a small binary TCP protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │              (acceptor + worker pool)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Engine (router)                          │
//! │          (role checks, commit hook, log dumps)              │
//! └───────┬─────────────────────┬─────────────────────┬─────────┘
//!         │                     │                     │
//!         ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │  LazyList   │       │     Log     │       │   Gateway   │
//!  │ (node locks)│       │  (append)   │       │ (to backup) │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod list;
pub mod wal;
pub mod protocol;
pub mod replication;
pub mod engine;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, Role};
pub use engine::Engine;
pub use client::Client;
pub use list::LazyList;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of LazyKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
