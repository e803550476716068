//! Protocol Module
//!
//! Defines the wire protocol shared by clients and the primary/backup pair.
//!
//! ## Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Tag (3)  │ Len (4)  │         Body                │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - KVI: insert          - Body: key + value (length-prefixed decimal)
//! - KVG: get             - Body: key
//! - KVD: delete          - Body: key
//! - PVI: replicated KVI  - Body: key + value [+ sequence]
//! - PVD: replicated KVD  - Body: key [+ sequence]
//! - DOR: log dump        - Body: raw log bytes
//!
//! ### Responses
//! - `OK`, `ERR_KEY`, `INVALID`, or the decimal value of a get

mod command;
mod response;
mod codec;

pub use command::{Command, CommandTag, Sequence};
pub use response::{Response, TOKEN_ERR_KEY, TOKEN_INVALID, TOKEN_OK};
pub use codec::{
    decode_body, decode_command, encode_command, parse_header, read_command, read_response,
    write_command, write_response, HEADER_SIZE, MAX_BODY_SIZE, SEQUENCE_TRAILER_SIZE,
};
