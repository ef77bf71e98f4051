//! Shared helpers for tests that need live servers
#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use shardfs::config::NetworkConfig;
use shardfs::network::{Handler, Server, ShutdownHandle};
use shardfs::{Framing, Hub, HubConfig, NodeConfig, Shard, ShardTable, StorageNode};

/// A server running on a background thread; stopped on drop
pub struct Running {
    pub addr: SocketAddr,
    shutdown: ShutdownHandle,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn loopback(max_connections: usize) -> NetworkConfig {
    NetworkConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        max_connections,
        read_timeout_ms: 10_000,
        write_timeout_ms: 10_000,
    }
}

pub fn start<H: Handler>(handler: Arc<H>, network: NetworkConfig) -> Running {
    let server = Server::bind(network, handler).unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let handle = thread::spawn(move || server.run().unwrap());

    Running {
        addr,
        shutdown,
        handle: Some(handle),
    }
}

pub fn start_node(root: &Path, staging: &Path, extension: &str, framing: Framing) -> Running {
    let config = NodeConfig::builder()
        .storage_root(root)
        .staging_dir(staging)
        .extension(extension)
        .framing(framing)
        .build();
    let node = StorageNode::open(config).unwrap();
    start(Arc::new(node), loopback(64))
}

/// Hub with `c` local, then `pdf` and `txt` remote, in that order
pub fn hub_config(root: &Path, staging: &Path, pdf: SocketAddr, txt: SocketAddr, framing: Framing) -> HubConfig {
    let shards = ShardTable::new(vec![
        Shard::local("c"),
        Shard::remote("pdf", pdf.to_string()),
        Shard::remote("txt", txt.to_string()),
    ])
    .unwrap();

    HubConfig::builder()
        .storage_root(root)
        .staging_dir(staging)
        .shards(shards)
        .node_framing(framing)
        .connect_timeout_ms(2000)
        .read_timeout_ms(10_000)
        .write_timeout_ms(10_000)
        .build()
}

pub fn start_hub(config: HubConfig) -> Running {
    let hub = Hub::open(config).unwrap();
    start(Arc::new(hub), loopback(64))
}

/// Send one request line plus body, half-close, read until the peer closes
pub fn request(addr: SocketAddr, line: &str, body: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(15))).unwrap();
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(body).unwrap();
    stream.shutdown(Shutdown::Write).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    response
}

pub fn request_text(addr: SocketAddr, line: &str) -> String {
    String::from_utf8(request(addr, line, b"")).unwrap()
}

/// Number of regular files anywhere below `dir`
pub fn count_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// Deterministic, non-repeating-looking test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 7) % 251) as u8).collect()
}
