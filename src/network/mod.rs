//! Network Module
//!
//! TCP server, per-connection I/O and the hub's outbound node client.
//!
//! ## Architecture
//! - Single non-blocking acceptor loop
//! - One worker thread per connection, capped by `max_connections`
//! - Exactly one request per connection

mod server;
mod connection;
mod client;

pub use server::{Handler, Server, ShutdownHandle};
pub use connection::Connection;
pub use client::{NodeClient, Relayed};
