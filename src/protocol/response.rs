//! Frame definitions
//!
//! Units of a length-prefixed message on a hub ↔ node link.

use bytes::Bytes;

/// Frame status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Content bytes (request line, file body, listing, archive)
    Data = 0x00,

    /// Human-readable failure text
    Error = 0x01,

    /// End of message; payload must be empty
    End = 0x02,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Data),
            0x01 => Some(Status::Error),
            0x02 => Some(Status::End),
            _ => None,
        }
    }
}

/// A single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub status: Status,
    pub payload: Bytes,
}

impl Frame {
    /// Create a DATA frame
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self {
            status: Status::Data,
            payload: payload.into(),
        }
    }

    /// Create an ERROR frame carrying a message line
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Bytes::copy_from_slice(message.as_bytes()),
        }
    }

    /// Create an END frame
    pub fn end() -> Self {
        Self {
            status: Status::End,
            payload: Bytes::new(),
        }
    }

    pub fn is_end(&self) -> bool {
        self.status == Status::End
    }
}
