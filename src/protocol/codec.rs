//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Tag (3)  │ Len (4)  │         Body                │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Body by Command
//! - KVI/PVI: key_len (4) + key + value_len (4) + value
//! - KVD/PVD/KVG: key_len (4) + key
//! - PVI/PVD: optionally followed by session (8) + seq (8)
//! - DOR: raw log bytes
//!
//! Keys and values travel as decimal ASCII; every integer in the framing is
//! little-endian.
//!
//! ### Response Format
//! Unframed bytes, terminated by the server closing the connection.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::{Command, CommandTag, Response, Sequence};
use crate::error::{KvError, Result};

/// Header size: 3 byte tag + 4 bytes body length
pub const HEADER_SIZE: usize = 7;

/// Maximum body size (64 MB); bounds `DOR` blobs
pub const MAX_BODY_SIZE: u32 = 64 * 1024 * 1024;

/// Optional replication trailer: session (8) + seq (8)
pub const SEQUENCE_TRAILER_SIZE: usize = 16;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: tag (3) + body_len (4) + body. Fails if the body exceeds
/// [`MAX_BODY_SIZE`], since no server would accept it.
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let mut body = BytesMut::new();

    match command {
        Command::Insert { key, value } => {
            put_decimal(&mut body, *key);
            put_decimal(&mut body, *value);
        }
        Command::Get { key } | Command::Delete { key } => {
            put_decimal(&mut body, *key);
        }
        Command::ReplicatedInsert { key, value, sequence } => {
            put_decimal(&mut body, *key);
            put_decimal(&mut body, *value);
            put_sequence(&mut body, sequence);
        }
        Command::ReplicatedDelete { key, sequence } => {
            put_decimal(&mut body, *key);
            put_sequence(&mut body, sequence);
        }
        Command::LogDump { bytes } => body.put_slice(bytes),
    }

    let body_len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_BODY_SIZE)
        .ok_or_else(|| {
            KvError::Protocol(format!(
                "{:?} body too large: {} bytes (max {})",
                command.tag(),
                body.len(),
                MAX_BODY_SIZE
            ))
        })?;

    let mut message = BytesMut::with_capacity(HEADER_SIZE + body.len());
    message.put_slice(command.tag().as_bytes());
    message.put_u32_le(body_len);
    message.put_slice(&body);

    Ok(message.to_vec())
}

/// Decode a complete message (header + body)
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    if bytes.len() < HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&bytes[..HEADER_SIZE]);
    let (tag, body_len) = parse_header(&header)?;

    let total_len = HEADER_SIZE + body_len;
    if bytes.len() < total_len {
        return Err(KvError::Protocol(format!(
            "Incomplete body: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    decode_body(tag, &bytes[HEADER_SIZE..total_len])
}

/// Parse a request header into its tag and body length
pub fn parse_header(header: &[u8; HEADER_SIZE]) -> Result<(CommandTag, usize)> {
    let tag = CommandTag::from_bytes(&header[..3]).ok_or_else(|| {
        KvError::UnknownCommand(String::from_utf8_lossy(&header[..3]).into_owned())
    })?;

    let body_len = u32::from_le_bytes([header[3], header[4], header[5], header[6]]);
    if body_len > MAX_BODY_SIZE {
        return Err(KvError::Protocol(format!(
            "Body too large: {} bytes (max {})",
            body_len, MAX_BODY_SIZE
        )));
    }

    Ok((tag, body_len as usize))
}

/// Decode a body according to its tag
pub fn decode_body(tag: CommandTag, body: &[u8]) -> Result<Command> {
    let mut buf = body;

    let command = match tag {
        CommandTag::Kvi => {
            let key = take_decimal(&mut buf, "KVI key")?;
            let value = take_decimal(&mut buf, "KVI value")?;
            Command::Insert { key, value }
        }
        CommandTag::Kvg => Command::Get {
            key: take_decimal(&mut buf, "KVG key")?,
        },
        CommandTag::Kvd => Command::Delete {
            key: take_decimal(&mut buf, "KVD key")?,
        },
        CommandTag::Pvi => {
            let key = take_decimal(&mut buf, "PVI key")?;
            let value = take_decimal(&mut buf, "PVI value")?;
            let sequence = take_sequence(&mut buf)?;
            Command::ReplicatedInsert { key, value, sequence }
        }
        CommandTag::Pvd => {
            let key = take_decimal(&mut buf, "PVD key")?;
            let sequence = take_sequence(&mut buf)?;
            Command::ReplicatedDelete { key, sequence }
        }
        CommandTag::Dor => {
            return Ok(Command::LogDump {
                bytes: body.to_vec(),
            })
        }
    };

    if buf.has_remaining() {
        return Err(KvError::Protocol(format!(
            "{:?} command: {} unexpected trailing bytes",
            tag,
            buf.remaining()
        )));
    }

    Ok(command)
}

fn put_decimal(buf: &mut BytesMut, n: i32) {
    let text = n.to_string();
    buf.put_u32_le(text.len() as u32);
    buf.put_slice(text.as_bytes());
}

fn put_sequence(buf: &mut BytesMut, sequence: &Option<Sequence>) {
    if let Some(sequence) = sequence {
        buf.put_u64_le(sequence.session);
        buf.put_u64_le(sequence.seq);
    }
}

/// Take one length-prefixed decimal field
fn take_decimal(buf: &mut &[u8], field: &str) -> Result<i32> {
    if buf.remaining() < 4 {
        return Err(KvError::Protocol(format!("{}: missing length", field)));
    }

    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(KvError::Protocol(format!(
            "{}: incomplete (expected {}, got {})",
            field,
            len,
            buf.remaining()
        )));
    }

    let text = std::str::from_utf8(&buf[..len])
        .map_err(|_| KvError::Protocol(format!("{}: not ASCII", field)))?;
    let n = text
        .parse::<i32>()
        .map_err(|e| KvError::Protocol(format!("{}: {:?} is not an integer ({})", field, text, e)))?;

    buf.advance(len);
    Ok(n)
}

/// Take the optional replication trailer
fn take_sequence(buf: &mut &[u8]) -> Result<Option<Sequence>> {
    match buf.remaining() {
        0 => Ok(None),
        SEQUENCE_TRAILER_SIZE => Ok(Some(Sequence {
            session: buf.get_u64_le(),
            seq: buf.get_u64_le(),
        })),
        n => Err(KvError::Protocol(format!(
            "Replication trailer: expected {} bytes, got {}",
            SEQUENCE_TRAILER_SIZE, n
        ))),
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs. An
/// unknown tag is reported before the body is read.
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let (tag, body_len) = parse_header(&header)?;

    // Grows with the bytes that actually arrive, not with the claimed length
    let mut body = Vec::new();
    reader.by_ref().take(body_len as u64).read_to_end(&mut body)?;
    if body.len() < body_len {
        return Err(KvError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("{:?} body: expected {} bytes, got {}", tag, body_len, body.len()),
        )));
    }

    decode_body(tag, &body)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a response, consuming the stream to EOF
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Response::from_bytes(&bytes)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&response.to_bytes())?;
    writer.flush()?;
    Ok(())
}
