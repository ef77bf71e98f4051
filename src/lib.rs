//! # shardfs
//!
//! A file store sharded by file type:
//! - A routing hub is the only public entry point
//! - Each extension is owned by exactly one node (the hub itself or a storage node)
//! - Archives are built in-process as tar and deleted after transmission
//! - Listings aggregate every shard in a fixed order
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                               │
//! │         (one connection per ufile/dfile/rmfile/...)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Hub                                  │
//! │          (shard table: extension → location)                 │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │                      │                       │
//!        ▼                      ▼                       ▼
//!  ┌─────────────┐      ┌──────────────┐        ┌──────────────┐
//!  │ Local shard │      │ Storage node │        │ Storage node │
//!  │    (.c)     │      │    (.pdf)    │        │    (.txt)    │
//!  └─────────────┘      └──────────────┘        └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod shard;
pub mod protocol;
pub mod storage;
pub mod network;
pub mod node;
pub mod hub;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, ShardError};
pub use config::{Framing, HubConfig, NodeConfig};
pub use hub::Hub;
pub use node::StorageNode;
pub use shard::{Shard, ShardTable};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of shardfs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
