//! Configuration for shardfs
//!
//! Centralized configuration with sensible defaults. The hub and each
//! storage node get their own config struct; both are plain values built
//! once at startup and never mutated afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ShardError;
use crate::shard::ShardTable;

/// How the end of a message is signalled on a hub ↔ node link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Sender shuts down its write half when done (legacy compatible)
    #[default]
    HalfClose,

    /// Checksummed frames with an explicit end marker
    LengthPrefixed,
}

impl FromStr for Framing {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "half-close" => Ok(Framing::HalfClose),
            "length-prefixed" => Ok(Framing::LengthPrefixed),
            other => Err(ShardError::Config(format!("unknown framing '{}'", other))),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::HalfClose => write!(f, "half-close"),
            Framing::LengthPrefixed => write!(f, "length-prefixed"),
        }
    }
}

/// Settings shared by every listening server
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl NetworkConfig {
    fn with_addr(addr: &str) -> Self {
        Self {
            listen_addr: addr.to_string(),
            max_connections: 256,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
        }
    }
}

// =============================================================================
// Hub
// =============================================================================

/// Configuration for the routing hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root of the hub's own shard tree
    pub storage_root: PathBuf,

    /// Logical prefix clients put in front of destination paths
    pub root_prefix: String,

    /// Where transient archives are written (OS temp dir when unset)
    pub staging_dir: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Routing Configuration
    // -------------------------------------------------------------------------
    /// Extension → location table
    pub shards: ShardTable,

    /// Framing used on outbound node connections
    pub node_framing: Framing,

    /// Outbound connect timeout (milliseconds, 0 = none)
    pub connect_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    pub network: NetworkConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./smain"),
            root_prefix: "~smain".to_string(),
            staging_dir: None,
            shards: ShardTable::default(),
            node_framing: Framing::HalfClose,
            connect_timeout_ms: 5000,
            network: NetworkConfig::with_addr("127.0.0.1:50501"),
        }
    }
}

impl HubConfig {
    /// Create a new config builder
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }
}

/// Builder for HubConfig
#[derive(Default)]
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    /// Set the hub's local storage root
    pub fn storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_root = path.into();
        self
    }

    /// Set the logical root prefix stripped from client paths
    pub fn root_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.root_prefix = prefix.into();
        self
    }

    /// Set the directory for transient archives
    pub fn staging_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(path.into());
        self
    }

    /// Set the shard table
    pub fn shards(mut self, shards: ShardTable) -> Self {
        self.config.shards = shards;
        self
    }

    /// Set the framing for hub → node links
    pub fn node_framing(mut self, framing: Framing) -> Self {
        self.config.node_framing = framing;
        self
    }

    /// Set the outbound connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.network.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.network.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.network.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.network.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> HubConfig {
        self.config
    }
}

// =============================================================================
// Storage Node
// =============================================================================

/// Configuration for a storage node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Root of the node's shard tree
    pub storage_root: PathBuf,

    /// Extension this node manages (without the dot)
    pub extension: String,

    /// Framing expected on inbound hub connections
    pub framing: Framing,

    /// Where transient archives are written (OS temp dir when unset)
    pub staging_dir: Option<PathBuf>,

    pub network: NetworkConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./stext"),
            extension: "txt".to_string(),
            framing: Framing::HalfClose,
            staging_dir: None,
            network: NetworkConfig::with_addr("127.0.0.1:50502"),
        }
    }
}

impl NodeConfig {
    /// Create a new config builder
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }
}

/// Builder for NodeConfig
#[derive(Default)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_root = path.into();
        self
    }

    /// Set the managed extension (leading dot optional)
    pub fn extension(mut self, ext: &str) -> Self {
        self.config.extension = crate::shard::normalize_extension(ext).to_string();
        self
    }

    pub fn framing(mut self, framing: Framing) -> Self {
        self.config.framing = framing;
        self
    }

    pub fn staging_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(path.into());
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.network.listen_addr = addr.into();
        self
    }

    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.network.max_connections = count;
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.network.read_timeout_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.network.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.config
    }
}
