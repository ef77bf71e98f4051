//! Protocol codec
//!
//! Request line reading plus encoding and decoding of length-prefixed frames.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────┬──────────┐
//! │Status(1) │ Len (4)  │       Payload       │ CRC (4)  │
//! └──────────┴──────────┴─────────────────────┴──────────┘
//! ```
//! Length and CRC are big-endian; the CRC covers the payload only.

use std::io::{BufRead, Read, Write};

use bytes::Bytes;

use super::{Frame, Status};
use crate::error::{Result, ShardError};

/// Header size: 1 byte status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Trailer size: 4 byte CRC32
pub const TRAILER_SIZE: usize = 4;

/// Maximum payload per frame (64 KB)
pub const MAX_FRAME_PAYLOAD: usize = 64 * 1024;

/// Maximum request line length, newline excluded
pub const MAX_COMMAND_LEN: usize = 4096;

// =============================================================================
// Request Lines
// =============================================================================

/// Read one request line from a half-close stream
///
/// The line ends at `\n` or at end of stream. Bytes after the newline are
/// left in the reader for the body.
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut raw = Vec::with_capacity(128);
    let limit = (MAX_COMMAND_LEN + 1) as u64;
    reader.by_ref().take(limit).read_until(b'\n', &mut raw)?;

    if raw.last() == Some(&b'\n') {
        raw.pop();
    } else if raw.len() > MAX_COMMAND_LEN {
        return Err(ShardError::CommandTooLong { max: MAX_COMMAND_LEN });
    }

    line_from_bytes(raw)
}

/// Turn raw request bytes into a trimmed line
pub fn line_from_bytes(mut raw: Vec<u8>) -> Result<String> {
    if raw.len() > MAX_COMMAND_LEN {
        return Err(ShardError::CommandTooLong { max: MAX_COMMAND_LEN });
    }
    while matches!(raw.last(), Some(b'\n') | Some(b'\r') | Some(0)) {
        raw.pop();
    }
    if raw.is_empty() {
        return Err(ShardError::MalformedCommand("empty request".to_string()));
    }

    String::from_utf8(raw)
        .map_err(|_| ShardError::MalformedCommand("request is not valid UTF-8".to_string()))
}

// =============================================================================
// Frame Encoding/Decoding
// =============================================================================

/// Encode a frame to bytes
///
/// Format: status (1) + payload_len (4) + payload + crc (4)
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let payload = &frame.payload[..];

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    message.push(frame.status as u8);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    message.extend_from_slice(&crc32fast::hash(payload).to_be_bytes());

    message
}

/// Decode a frame from a complete buffer
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < HEADER_SIZE {
        return Err(ShardError::Protocol(format!(
            "Incomplete frame header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let (status, payload_len) = parse_header(&[bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]])?;

    let total_len = HEADER_SIZE + payload_len + TRAILER_SIZE;
    if bytes.len() < total_len {
        return Err(ShardError::Protocol(format!(
            "Incomplete frame: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let payload = &bytes[HEADER_SIZE..HEADER_SIZE + payload_len];
    let crc_start = HEADER_SIZE + payload_len;
    let crc = u32::from_be_bytes([
        bytes[crc_start],
        bytes[crc_start + 1],
        bytes[crc_start + 2],
        bytes[crc_start + 3],
    ]);

    finish_frame(status, Bytes::copy_from_slice(payload), crc)
}

/// Validate a header: known status, bounded length
fn parse_header(header: &[u8; HEADER_SIZE]) -> Result<(Status, usize)> {
    let status = Status::from_byte(header[0]).ok_or_else(|| {
        ShardError::Protocol(format!("Unknown frame status: 0x{:02x}", header[0]))
    })?;
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    if payload_len > MAX_FRAME_PAYLOAD {
        return Err(ShardError::Protocol(format!(
            "Frame payload too large: {} bytes (max {})",
            payload_len, MAX_FRAME_PAYLOAD
        )));
    }
    if status == Status::End && payload_len != 0 {
        return Err(ShardError::Protocol(format!(
            "END frame carries {} payload bytes",
            payload_len
        )));
    }

    Ok((status, payload_len))
}

/// Check the CRC and assemble the frame
fn finish_frame(status: Status, payload: Bytes, crc: u32) -> Result<Frame> {
    let actual = crc32fast::hash(&payload);
    if actual != crc {
        return Err(ShardError::Protocol(format!(
            "Frame checksum mismatch: expected {:08x}, got {:08x}",
            crc, actual
        )));
    }
    Ok(Frame { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete frame from a stream
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let (status, payload_len) = parse_header(&header)?;

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    let mut crc = [0u8; TRAILER_SIZE];
    reader.read_exact(&mut crc)?;

    finish_frame(status, Bytes::from(payload), u32::from_be_bytes(crc))
}

/// Write a frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    writer.write_all(&encode_frame(frame))?;
    Ok(())
}
