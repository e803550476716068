//! Response definitions
//!
//! Responses are unframed ASCII: a result token, or the decimal value for a
//! successful get.

use crate::error::{KvError, Result};

pub const TOKEN_OK: &str = "OK";
pub const TOKEN_ERR_KEY: &str = "ERR_KEY";
pub const TOKEN_INVALID: &str = "INVALID";

/// A response to send to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Mutation applied
    Ok,

    /// Key missing (get/delete) or already present (insert)
    ErrKey,

    /// Operation not allowed in this server's role
    Invalid,

    /// Value found by a get
    Value(i32),
}

impl Response {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::Ok => TOKEN_OK.as_bytes().to_vec(),
            Response::ErrKey => TOKEN_ERR_KEY.as_bytes().to_vec(),
            Response::Invalid => TOKEN_INVALID.as_bytes().to_vec(),
            Response::Value(value) => value.to_string().into_bytes(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| KvError::Protocol("Response is not valid UTF-8".to_string()))?;

        match text {
            TOKEN_OK => Ok(Response::Ok),
            TOKEN_ERR_KEY => Ok(Response::ErrKey),
            TOKEN_INVALID => Ok(Response::Invalid),
            other => other.parse::<i32>().map(Response::Value).map_err(|_| {
                KvError::Protocol(format!("Unrecognized response: {:?}", other))
            }),
        }
    }
}
