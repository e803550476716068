//! Worker Pool
//!
//! Fixed set of threads, each running one connection to completion before
//! taking the next from a shared queue.

use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};

use crate::engine::Engine;
use crate::error::{KvError, Result};

use super::Connection;

/// Pool of connection-handling threads
pub struct WorkerPool {
    sender: Option<Sender<TcpStream>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing `engine`
    pub fn new(size: usize, engine: Arc<Engine>) -> Result<Self> {
        if size == 0 {
            return Err(KvError::Config("worker pool needs at least one thread".to_string()));
        }

        let (sender, receiver) = channel::unbounded::<TcpStream>();
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let receiver = receiver.clone();
            let engine = Arc::clone(&engine);

            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || {
                    for stream in receiver.iter() {
                        let result = Connection::new(stream, Arc::clone(&engine))
                            .and_then(|mut connection| connection.handle());
                        if let Err(e) = result {
                            tracing::debug!("Connection closed with error: {}", e);
                        }
                    }
                })?;

            workers.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Queue an accepted connection for the next free worker
    pub fn dispatch(&self, stream: TcpStream) {
        if let Some(sender) = &self.sender {
            if sender.send(stream).is_err() {
                tracing::warn!("Worker pool is shut down; dropping connection");
            }
        }
    }

    /// Close the queue and wait for workers to finish their connections
    pub fn join(mut self) {
        self.sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
    }
}
