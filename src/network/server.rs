//! TCP Server
//!
//! Accepts connections and dispatches them to the worker pool.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

use super::WorkerPool;

/// TCP server for LazyKV
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
}

/// Stops a running server from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Signal the accept loop to stop
    ///
    /// Connects once to the listener so a blocked `accept` wakes up.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
        let _ = TcpStream::connect(self.addr);
    }
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            engine,
            listener,
            local_addr,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            addr: self.local_addr,
        }
    }

    /// Run the accept loop (blocking)
    ///
    /// Returns after `ShutdownHandle::shutdown` once every worker has
    /// finished its current connection.
    pub fn run(&self) -> Result<()> {
        let pool = WorkerPool::new(self.config.worker_threads, Arc::clone(&self.engine))?;

        tracing::info!(
            "Listening on {} with {} workers",
            self.local_addr,
            self.config.worker_threads
        );

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            match stream {
                Ok(stream) => pool.dispatch(stream),
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        tracing::info!("Accept loop stopped, waiting for workers");
        pool.join();
        Ok(())
    }
}
