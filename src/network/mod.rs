//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Worker thread pool for connections
//! - Commands routed through Engine

mod server;
mod pool;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use pool::WorkerPool;
pub use connection::Connection;
