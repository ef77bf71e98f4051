//! Storage Node Client
//!
//! Short-lived outbound connections from the hub to a storage node.

use std::io::{self, Read, Write};

use crate::config::Framing;
use crate::error::Result;
use crate::network::Connection;
use crate::protocol::NodeCommand;

/// Outcome of a relayed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relayed {
    /// Bytes copied from the node to the caller
    pub bytes: u64,

    /// The node flagged its response as a failure (framed links only)
    pub remote_error: bool,
}

/// Client for one storage node; opens a fresh connection per request
#[derive(Debug, Clone)]
pub struct NodeClient {
    addr: String,
    framing: Framing,
    connect_timeout_ms: u64,
    read_timeout_ms: u64,
    write_timeout_ms: u64,
}

impl NodeClient {
    pub fn new(addr: impl Into<String>, framing: Framing) -> Self {
        Self {
            addr: addr.into(),
            framing,
            connect_timeout_ms: 0,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
        }
    }

    /// Set connect/read/write timeouts in milliseconds (0 = none)
    pub fn with_timeouts(mut self, connect_ms: u64, read_ms: u64, write_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self.write_timeout_ms = write_ms;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send `command` (plus `body` for STORE) and copy the whole response
    /// into `out`, looping until the node ends its message
    pub fn relay<W: Write + ?Sized>(
        &self,
        command: &NodeCommand,
        body: Option<&mut dyn Read>,
        out: &mut W,
    ) -> Result<Relayed> {
        let mut conn = Connection::connect(&self.addr, self.framing, self.connect_timeout_ms)?;
        conn.set_timeouts(self.read_timeout_ms, self.write_timeout_ms)?;

        tracing::debug!("-> {} {}", self.addr, command.to_line().trim_end());

        conn.write_command_line(&command.to_line())?;
        if let Some(body) = body {
            let sent = io::copy(body, &mut conn)?;
            tracing::trace!("Sent {} body bytes to {}", sent, self.addr);
        }
        conn.finish_request(command.has_body())?;

        let bytes = io::copy(&mut conn, out)?;
        let remote_error = conn.remote_error();
        if remote_error {
            tracing::debug!("{} answered {} with an error", self.addr, command.keyword());
        }

        Ok(Relayed { bytes, remote_error })
    }

    /// Relay into memory
    pub fn fetch(&self, command: &NodeCommand) -> Result<(Vec<u8>, Relayed)> {
        let mut buffer = Vec::new();
        let relayed = self.relay(command, None, &mut buffer)?;
        Ok((buffer, relayed))
    }
}
