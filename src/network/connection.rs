//! Connection Handler
//!
//! Wraps one TCP stream for a single request/response cycle.
//!
//! A `Connection` reads the request line, then acts as a plain
//! `Read`/`Write` pipe for the body and the response. The framing decides
//! what "end of message" means:
//! - `HalfClose`: EOF on read, `shutdown(Write)` on finish
//! - `LengthPrefixed`: DATA/ERROR frames until an END frame

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::{Buf, Bytes};

use crate::config::Framing;
use crate::error::{Result, ShardError};
use crate::protocol::{
    line_from_bytes, read_frame, read_line, write_frame, Frame, Status, MAX_FRAME_PAYLOAD,
};

/// A single request/response cycle over TCP
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    framing: Framing,

    /// Unread payload of the current frame (framed mode only)
    pending: Bytes,

    /// END frame already consumed
    body_done: bool,

    /// Peer sent at least one ERROR frame
    remote_error: bool,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, framing: Framing) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            framing,
            pending: Bytes::new(),
            body_done: false,
            remote_error: false,
            peer_addr,
        })
    }

    /// Open an outbound connection to `addr`
    ///
    /// Tries every resolved address; a `connect_timeout_ms` of 0 blocks
    /// until the OS gives up.
    pub fn connect(addr: &str, framing: Framing, connect_timeout_ms: u64) -> Result<Self> {
        let peer_err = |source: io::Error| ShardError::PeerConnect {
            addr: addr.to_string(),
            source,
        };

        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing");
        for socket_addr in addr.to_socket_addrs().map_err(peer_err)? {
            let attempt = if connect_timeout_ms > 0 {
                TcpStream::connect_timeout(&socket_addr, Duration::from_millis(connect_timeout_ms))
            } else {
                TcpStream::connect(socket_addr)
            };
            match attempt {
                Ok(stream) => return Self::new(stream, framing),
                Err(e) => last_err = e,
            }
        }

        Err(peer_err(last_err))
    }

    /// Configure connection timeouts (0 leaves a direction unbounded)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    // =========================================================================
    // Request Line
    // =========================================================================

    /// Read the request line
    pub fn read_command_line(&mut self) -> Result<String> {
        match self.framing {
            Framing::HalfClose => read_line(&mut self.reader),
            Framing::LengthPrefixed => {
                let frame = read_frame(&mut self.reader)?;
                match frame.status {
                    Status::Data => line_from_bytes(frame.payload.to_vec()),
                    Status::End => {
                        self.body_done = true;
                        Err(ShardError::MalformedCommand("empty request".to_string()))
                    }
                    Status::Error => Err(ShardError::Protocol(
                        "request opened with an ERROR frame".to_string(),
                    )),
                }
            }
        }
    }

    /// Send a request line
    pub fn write_command_line(&mut self, line: &str) -> Result<()> {
        match self.framing {
            Framing::HalfClose => self.writer.write_all(line.as_bytes())?,
            Framing::LengthPrefixed => {
                write_frame(&mut self.writer, &Frame::data(line.as_bytes().to_vec()))?
            }
        }
        Ok(())
    }

    /// Signal the end of an outbound request
    ///
    /// Framed requests only carry an END frame when a body followed the line.
    pub fn finish_request(&mut self, has_body: bool) -> Result<()> {
        match self.framing {
            Framing::HalfClose => self.finish(),
            Framing::LengthPrefixed => {
                if has_body {
                    write_frame(&mut self.writer, &Frame::end())?;
                }
                self.writer.flush()?;
                Ok(())
            }
        }
    }

    // =========================================================================
    // Response
    // =========================================================================

    /// Send a failure line
    pub fn send_error(&mut self, message: &str) -> Result<()> {
        match self.framing {
            Framing::HalfClose => self.writer.write_all(message.as_bytes())?,
            Framing::LengthPrefixed => write_frame(&mut self.writer, &Frame::error(message))?,
        }
        Ok(())
    }

    /// Signal the end of the message we are sending
    pub fn finish(&mut self) -> Result<()> {
        if self.framing == Framing::LengthPrefixed {
            write_frame(&mut self.writer, &Frame::end())?;
        }
        self.writer.flush()?;

        if self.framing == Framing::HalfClose {
            ignore_not_connected(self.writer.get_ref().shutdown(Shutdown::Write))?;
        }
        Ok(())
    }

    /// Finish and tear down both directions
    pub fn close(&mut self) -> Result<()> {
        self.finish()?;
        ignore_not_connected(self.writer.get_ref().shutdown(Shutdown::Both))?;
        Ok(())
    }

    /// Discard whatever is left of the inbound message
    pub fn drain(&mut self) -> u64 {
        io::copy(self, &mut io::sink()).unwrap_or(0)
    }

    /// Whether the peer reported a failure (framed mode only)
    pub fn remote_error(&self) -> bool {
        self.remote_error
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.framing == Framing::HalfClose {
            return self.reader.read(buf);
        }

        while self.pending.is_empty() {
            if self.body_done || buf.is_empty() {
                return Ok(0);
            }
            let frame = read_frame(&mut self.reader).map_err(into_io)?;
            match frame.status {
                Status::End => self.body_done = true,
                Status::Error => {
                    self.remote_error = true;
                    self.pending = frame.payload;
                }
                Status::Data => self.pending = frame.payload,
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.framing {
            Framing::HalfClose => self.writer.write(buf),
            Framing::LengthPrefixed => {
                let n = buf.len().min(MAX_FRAME_PAYLOAD);
                if n == 0 {
                    return Ok(0);
                }
                write_frame(&mut self.writer, &Frame::data(buf[..n].to_vec())).map_err(into_io)?;
                Ok(n)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn into_io(err: ShardError) -> io::Error {
    match err {
        ShardError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

fn ignore_not_connected(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}
