//! Storage Node
//!
//! Owns one shard on local disk and answers the hub's requests.
//!
//! ## Request Handling
//! Each connection carries exactly one request:
//! 1. Read the request line
//! 2. Parse into a [`NodeCommand`]
//! 3. Execute against the [`ShardStore`], streaming the result
//! 4. Finish the message and close
//!
//! Failures become a single text line (an ERROR frame on framed links).

use std::io::{self, Write};
use std::path::Path;

use crate::config::{Framing, NodeConfig};
use crate::error::{Result, ShardError};
use crate::network::{Connection, Handler};
use crate::protocol::NodeCommand;
use crate::storage::ShardStore;

pub const STORED: &str = "File uploaded successfully.\n";
pub const DELETED: &str = "File deleted successfully.\n";

/// A storage node serving one extension
pub struct StorageNode {
    config: NodeConfig,
    store: ShardStore,
}

impl StorageNode {
    /// Open the node's shard tree
    pub fn open(config: NodeConfig) -> Result<Self> {
        if config.extension.is_empty() {
            return Err(ShardError::Config("storage node needs an extension".to_string()));
        }

        let mut store = ShardStore::open(&config.storage_root, &config.extension)?;
        if let Some(dir) = &config.staging_dir {
            store = store.with_staging_dir(dir)?;
        }
        tracing::info!(
            "Storage node for .{} files at {}",
            store.extension(),
            store.root().display()
        );

        Ok(Self { config, store })
    }

    pub fn store(&self) -> &ShardStore {
        &self.store
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Execute one command, writing the response body to `conn`
    pub fn execute(&self, command: &NodeCommand, conn: &mut Connection) -> Result<()> {
        match command {
            NodeCommand::Store { path } => {
                let (target, bytes) = self.store.write_path(path, conn)?;
                tracing::info!("Stored {} ({} bytes)", target.display(), bytes);
                conn.write_all(STORED.as_bytes())?;
            }
            NodeCommand::Retrieve { name } => {
                let mut file = self.store.open_file(name)?;
                let bytes = io::copy(&mut file, conn)?;
                tracing::info!("Sent {} ({} bytes)", name, bytes);
            }
            NodeCommand::Delete { name } => {
                let path = self.store.remove(name)?;
                tracing::info!("Deleted {}", path.display());
                conn.write_all(DELETED.as_bytes())?;
            }
            NodeCommand::Archive => {
                // Dropping the temp file deletes the archive
                let mut archive = self.store.build_archive().map_err(|e| match e {
                    ShardError::ArchiveBuild(_) => e,
                    other => ShardError::ArchiveBuild(other.to_string()),
                })?;
                let bytes = io::copy(archive.as_file_mut(), conn)?;
                tracing::info!("Sent .{} archive ({} bytes)", self.store.extension(), bytes);
            }
            NodeCommand::List => {
                let listing = self.store.list_text(Path::new(""))?;
                conn.write_all(listing.as_bytes())?;
            }
        }
        Ok(())
    }
}

impl Handler for StorageNode {
    fn name(&self) -> &'static str {
        "node"
    }

    fn framing(&self) -> Framing {
        self.config.framing
    }

    fn handle(&self, conn: &mut Connection) -> Result<()> {
        let line = match conn.read_command_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Bad request from {}: {}", conn.peer_addr(), e);
                conn.send_error(e.client_message())?;
                return conn.close();
            }
        };

        tracing::debug!("Received command from {}: {}", conn.peer_addr(), line);

        let result = NodeCommand::parse(&line).and_then(|command| {
            let outcome = self.execute(&command, conn);
            if outcome.is_err() && command.has_body() {
                conn.drain();
            }
            outcome
        });

        if let Err(e) = result {
            if e.is_disconnect() {
                return Err(e);
            }
            tracing::warn!("{} from {} failed: {}", line, conn.peer_addr(), e);
            conn.send_error(e.client_message())?;
        }

        conn.finish()
    }
}
