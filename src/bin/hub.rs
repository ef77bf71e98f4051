//! shardfs Hub Binary
//!
//! Starts the routing hub.

use std::sync::Arc;

use clap::Parser;
use shardfs::network::Server;
use shardfs::{Framing, Hub, HubConfig, Shard, ShardTable};
use tracing_subscriber::{fmt, EnvFilter};

/// shardfs routing hub
#[derive(Parser, Debug)]
#[command(name = "shardfs-hub")]
#[command(about = "Routing hub for a type-sharded file store")]
#[command(version)]
struct Args {
    /// Root of the hub's own shard
    #[arg(short, long, default_value = "./smain")]
    storage_root: String,

    /// Logical prefix stripped from client paths
    #[arg(long, default_value = "~smain")]
    root_prefix: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:50501")]
    listen: String,

    /// Shard bindings in table order: `ext=local` or `ext=host:port`
    #[arg(long = "shard", value_name = "EXT=LOCATION")]
    shards: Vec<Shard>,

    /// Framing on hub → node links: half-close | length-prefixed
    #[arg(long, default_value = "half-close")]
    framing: Framing,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "256")]
    max_connections: usize,

    /// Outbound connect timeout in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    connect_timeout_ms: u64,

    /// Read/write timeout in milliseconds (0 = none)
    #[arg(long, default_value = "30000")]
    io_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardfs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("shardfs hub v{}", shardfs::VERSION);
    tracing::info!("Storage root: {}", args.storage_root);
    tracing::info!("Listen address: {}", args.listen);

    let shards = if args.shards.is_empty() {
        ShardTable::default()
    } else {
        match ShardTable::new(args.shards) {
            Ok(table) => table,
            Err(e) => {
                tracing::error!("Invalid shard table: {}", e);
                std::process::exit(2);
            }
        }
    };

    // Build config from args
    let config = HubConfig::builder()
        .storage_root(&args.storage_root)
        .root_prefix(args.root_prefix)
        .listen_addr(&args.listen)
        .shards(shards)
        .node_framing(args.framing)
        .max_connections(args.max_connections)
        .connect_timeout_ms(args.connect_timeout_ms)
        .read_timeout_ms(args.io_timeout_ms)
        .write_timeout_ms(args.io_timeout_ms)
        .build();

    let network = config.network.clone();
    let hub = match Hub::open(config) {
        Ok(hub) => Arc::new(hub),
        Err(e) => {
            tracing::error!("Failed to open hub: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(network, hub) {
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

    tracing::info!("Hub stopped");
}
