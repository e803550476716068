//! Blocking client
//!
//! One request per connection: connect, send, half-close, read the
//! unframed response to EOF.

use std::net::{Shutdown, TcpStream};

use crate::error::Result;
use crate::protocol::{read_response, write_command, Command, Response};

/// Client for a LazyKV server
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
}

impl Client {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one command and wait for its response
    pub fn request(&self, command: &Command) -> Result<Response> {
        let mut stream = TcpStream::connect(&self.addr)?;
        stream.set_nodelay(true)?;

        write_command(&mut stream, command)?;
        stream.shutdown(Shutdown::Write)?;

        read_response(&mut stream)
    }

    pub fn insert(&self, key: i32, value: i32) -> Result<Response> {
        self.request(&Command::Insert { key, value })
    }

    pub fn get(&self, key: i32) -> Result<Response> {
        self.request(&Command::Get { key })
    }

    pub fn delete(&self, key: i32) -> Result<Response> {
        self.request(&Command::Delete { key })
    }
}
