//! TCP Server
//!
//! Accepts connections and hands each one to its own worker thread.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{Framing, NetworkConfig};
use crate::error::{Result, ShardError};
use crate::network::Connection;
use crate::protocol::{write_frame, Frame};

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bounds on reading a rejected connection's request before closing it
const BUSY_DRAIN_TIMEOUT: Duration = Duration::from_millis(50);
const BUSY_DRAIN_LIMIT: u64 = 64 * 1024;

/// Serves one connection; implemented by the hub and the storage node
pub trait Handler: Send + Sync + 'static {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Framing expected on inbound connections
    fn framing(&self) -> Framing;

    /// Handle exactly one request on `conn`
    fn handle(&self, conn: &mut Connection) -> Result<()>;
}

/// Cloneable flag that stops a running server
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Thread-per-connection TCP server
pub struct Server<H: Handler> {
    listener: TcpListener,
    handler: Arc<H>,
    network: NetworkConfig,
    shutdown: ShutdownHandle,
    active: Arc<AtomicUsize>,
}

impl<H: Handler> Server<H> {
    /// Bind to `network.listen_addr`
    pub fn bind(network: NetworkConfig, handler: Arc<H>) -> Result<Self> {
        let listener = TcpListener::bind(&network.listen_addr)?;
        listener.set_nonblocking(true)?;

        tracing::info!(
            "{} listening on {}",
            handler.name(),
            listener.local_addr()?
        );

        Ok(Self {
            listener,
            handler,
            network,
            shutdown: ShutdownHandle::default(),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Accept until shutdown is signalled (blocking)
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("{} failed to accept: {}", self.handler.name(), e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("{} stopped accepting", self.handler.name());
        Ok(())
    }

    fn dispatch(&self, mut stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Dropping {}: {}", addr, e);
            return;
        }

        let previous = self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));
        if previous >= self.network.max_connections {
            tracing::warn!("Rejecting {}: {} connections active", addr, previous);
            if let Err(e) = reject_busy(&mut stream, self.handler.framing()) {
                tracing::debug!("Busy reply to {} failed: {}", addr, e);
            }
            return;
        }

        let handler = Arc::clone(&self.handler);
        let read_ms = self.network.read_timeout_ms;
        let write_ms = self.network.write_timeout_ms;

        let spawned = thread::Builder::new()
            .name(format!("{}-conn", handler.name()))
            .spawn(move || {
                let _guard = guard;
                serve(handler.as_ref(), stream, read_ms, write_ms);
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn worker for {}: {}", addr, e);
        }
    }
}

/// Tell a connection over the cap that the server is busy, in its own framing
fn reject_busy(stream: &mut TcpStream, framing: Framing) -> Result<()> {
    let message = ShardError::ServerBusy.client_message();
    match framing {
        Framing::HalfClose => stream.write_all(message.as_bytes())?,
        Framing::LengthPrefixed => {
            write_frame(stream, &Frame::error(message))?;
            write_frame(stream, &Frame::end())?;
        }
    }
    stream.flush()?;
    stream.shutdown(Shutdown::Write)?;

    // Swallow whatever request is in flight so the close is not a reset
    stream.set_read_timeout(Some(BUSY_DRAIN_TIMEOUT))?;
    let _drained = io::copy(&mut (&*stream).take(BUSY_DRAIN_LIMIT), &mut io::sink());
    Ok(())
}

/// Run one connection to completion on the current thread
fn serve<H: Handler>(handler: &H, stream: TcpStream, read_ms: u64, write_ms: u64) {
    let mut conn = match Connection::new(stream, handler.framing()) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Failed to set up connection: {}", e);
            return;
        }
    };

    if let Err(e) = conn.set_timeouts(read_ms, write_ms) {
        tracing::warn!("Failed to set timeouts for {}: {}", conn.peer_addr(), e);
    }

    tracing::debug!("Connection established from {}", conn.peer_addr());

    match handler.handle(&mut conn) {
        Ok(()) => {}
        Err(e) if e.is_disconnect() => {
            tracing::debug!("Client {} disconnected: {}", conn.peer_addr(), e);
        }
        Err(e) => tracing::warn!("Error serving {}: {}", conn.peer_addr(), e),
    }
}

/// Decrements the active connection count on drop
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
