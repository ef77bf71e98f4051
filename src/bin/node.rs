//! shardfs Storage Node Binary
//!
//! Serves one file-type shard to the hub.

use std::sync::Arc;

use clap::Parser;
use shardfs::network::Server;
use shardfs::{Framing, NodeConfig, StorageNode};
use tracing_subscriber::{fmt, EnvFilter};

/// shardfs storage node
#[derive(Parser, Debug)]
#[command(name = "shardfs-node")]
#[command(about = "Storage node owning one file-type shard")]
#[command(version)]
struct Args {
    /// Root of this node's shard
    #[arg(short, long, default_value = "./stext")]
    storage_root: String,

    /// Extension managed by this node (e.g. txt or .pdf)
    #[arg(short, long, default_value = "txt")]
    extension: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:50502")]
    listen: String,

    /// Framing expected from the hub: half-close | length-prefixed
    #[arg(long, default_value = "half-close")]
    framing: Framing,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "256")]
    max_connections: usize,

    /// Read/write timeout in milliseconds (0 = none)
    #[arg(long, default_value = "30000")]
    io_timeout_ms: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardfs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("shardfs node v{}", shardfs::VERSION);

    let config = NodeConfig::builder()
        .storage_root(&args.storage_root)
        .extension(&args.extension)
        .listen_addr(&args.listen)
        .framing(args.framing)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.io_timeout_ms)
        .write_timeout_ms(args.io_timeout_ms)
        .build();

    let network = config.network.clone();
    let node = match StorageNode::open(config) {
        Ok(node) => Arc::new(node),
        Err(e) => {
            tracing::error!("Failed to open storage node: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(network, node) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Node stopped");
}
