//! Hub Module
//!
//! The single public entry point. Resolves the owning shard of every
//! request, serves its own shard from local disk and proxies the rest to
//! storage nodes.
//!
//! ## Routing
//! - `ufile` / `dfile` / `rmfile`: shard chosen by the file name's extension
//! - `dtar`: shard chosen by the requested type
//! - `display`: local listing first, then every remote node in table order
//!
//! Remote requests open a fresh connection per call and relay the node's
//! response until the node ends its message.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::{Framing, HubConfig};
use crate::error::{Result, ShardError};
use crate::network::{Connection, Handler, NodeClient};
use crate::protocol::{ClientCommand, NodeCommand};
use crate::shard::{base_name, Location, Shard};
use crate::storage::{sanitize_relative, ShardStore};

pub const UPLOADED: &str = crate::node::STORED;
pub const DELETED: &str = crate::node::DELETED;

/// The routing hub
pub struct Hub {
    config: HubConfig,

    /// The hub's own shard
    local: ShardStore,

    /// One client per remote shard, in table order
    nodes: Vec<(String, NodeClient)>,
}

impl Hub {
    /// Open the hub's local shard and prepare node clients
    pub fn open(config: HubConfig) -> Result<Self> {
        let local_ext = config.shards.local().extension.clone();
        let mut local = ShardStore::open(&config.storage_root, &local_ext)?;
        if let Some(dir) = &config.staging_dir {
            local = local.with_staging_dir(dir)?;
        }

        let network = &config.network;
        let nodes = config
            .shards
            .remotes()
            .map(|(ext, addr)| {
                let client = NodeClient::new(addr, config.node_framing).with_timeouts(
                    config.connect_timeout_ms,
                    network.read_timeout_ms,
                    network.write_timeout_ms,
                );
                (ext.to_string(), client)
            })
            .collect::<Vec<_>>();

        tracing::info!(
            "Hub serving .{} locally at {}, {} remote shard(s)",
            local_ext,
            local.root().display(),
            nodes.len()
        );
        for shard in config.shards.iter() {
            tracing::debug!("  .{} -> {}", shard.extension, shard.location);
        }

        Ok(Self { config, local, nodes })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn local_store(&self) -> &ShardStore {
        &self.local
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Store `body` as `file_name` under `destination`; returns the ack text
    pub fn upload<R: Read>(&self, file_name: &str, destination: &str, body: &mut R) -> Result<Vec<u8>> {
        let shard = self.config.shards.resolve(file_name)?;
        let relative_dir = self.client_path(destination)?;

        match &shard.location {
            Location::Local => {
                let (path, bytes) = self.local.write_file(&relative_dir, file_name, body)?;
                tracing::info!("Uploaded {} ({} bytes)", path.display(), bytes);
                Ok(UPLOADED.as_bytes().to_vec())
            }
            Location::Remote(_) => {
                let path = wire_path(&relative_dir.join(base_name(file_name)));
                let mut reply = Vec::new();
                self.node(shard)?.relay(
                    &NodeCommand::Store { path },
                    Some(body as &mut dyn Read),
                    &mut reply,
                )?;
                Ok(reply)
            }
        }
    }

    /// Stream `file_name` into `out`
    pub fn download<W: Write + ?Sized>(&self, file_name: &str, out: &mut W) -> Result<u64> {
        let shard = self.config.shards.resolve(file_name)?;
        let name = wire_path(&self.client_path(file_name)?);

        match &shard.location {
            Location::Local => {
                let mut file = self.local.open_file(&name)?;
                let bytes = io::copy(&mut file, out)?;
                tracing::info!("Sent {} ({} bytes)", name, bytes);
                Ok(bytes)
            }
            Location::Remote(_) => {
                let relayed = self.node(shard)?.relay(&NodeCommand::Retrieve { name }, None, out)?;
                Ok(relayed.bytes)
            }
        }
    }

    /// Delete `file_name`, writing the status line into `out`
    pub fn delete<W: Write + ?Sized>(&self, file_name: &str, out: &mut W) -> Result<()> {
        let shard = self.config.shards.resolve(file_name)?;
        let name = wire_path(&self.client_path(file_name)?);

        match &shard.location {
            Location::Local => {
                let path = self.local.remove(&name)?;
                tracing::info!("Deleted {}", path.display());
                out.write_all(DELETED.as_bytes())?;
            }
            Location::Remote(_) => {
                self.node(shard)?.relay(&NodeCommand::Delete { name }, None, out)?;
            }
        }
        Ok(())
    }

    /// Stream a tar of every file of `file_type` (`.c` or `c`) into `out`
    pub fn archive<W: Write + ?Sized>(&self, file_type: &str, out: &mut W) -> Result<u64> {
        let shard = self
            .config
            .shards
            .lookup(file_type)
            .ok_or_else(|| ShardError::UnsupportedArchiveType(file_type.to_string()))?;

        match &shard.location {
            Location::Local => {
                // Dropping the temp file deletes the archive
                let mut archive = self.local.build_archive().map_err(|e| match e {
                    ShardError::ArchiveBuild(_) => e,
                    other => ShardError::ArchiveBuild(other.to_string()),
                })?;
                let bytes = io::copy(archive.as_file_mut(), out)?;
                tracing::info!("Sent .{} archive ({} bytes)", shard.extension, bytes);
                Ok(bytes)
            }
            Location::Remote(_) => {
                let relayed = self.node(shard)?.relay(&NodeCommand::Archive, None, out)?;
                Ok(relayed.bytes)
            }
        }
    }

    /// Write the combined listing for `path` into `out`
    ///
    /// Unreachable nodes are logged and skipped.
    pub fn list<W: Write + ?Sized>(&self, path: &str, out: &mut W) -> Result<()> {
        let relative = self.client_path(path)?;
        out.write_all(self.local.list_text(&relative)?.as_bytes())?;

        for (ext, client) in &self.nodes {
            match client.fetch(&NodeCommand::List) {
                Ok((_, relayed)) if relayed.remote_error => {
                    tracing::warn!("Node for .{} at {} failed to list", ext, client.addr());
                }
                Ok((mut listing, _)) => {
                    if !listing.is_empty() && listing.last() != Some(&b'\n') {
                        listing.push(b'\n');
                    }
                    out.write_all(&listing)?;
                }
                Err(e) => {
                    tracing::warn!("Skipping .{} listing: {}", ext, e);
                }
            }
        }
        Ok(())
    }

    /// Dispatch a parsed client command on a connection
    pub fn execute(&self, command: &ClientCommand, conn: &mut Connection) -> Result<()> {
        match command {
            ClientCommand::Upload { file_name, destination } => {
                let ack = match self.upload(file_name, destination, conn) {
                    Ok(ack) => ack,
                    Err(e) => {
                        conn.drain();
                        return Err(e);
                    }
                };
                conn.write_all(&ack)?;
            }
            ClientCommand::Download { file_name } => {
                self.download(file_name, conn)?;
            }
            ClientCommand::Remove { file_name } => self.delete(file_name, conn)?,
            ClientCommand::Archive { file_type } => {
                self.archive(file_type, conn)?;
            }
            ClientCommand::Display { path } => self.list(path, conn)?,
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn node(&self, shard: &Shard) -> Result<&NodeClient> {
        self.nodes
            .iter()
            .find(|(ext, _)| *ext == shard.extension)
            .map(|(_, client)| client)
            .ok_or_else(|| ShardError::UnsupportedType(shard.extension.clone()))
    }

    /// Strip the logical root prefix and validate what remains
    fn client_path(&self, raw: &str) -> Result<PathBuf> {
        let prefix = self.config.root_prefix.trim_end_matches('/');
        let rest = if prefix.is_empty() {
            raw
        } else if raw == prefix {
            ""
        } else {
            raw.strip_prefix(prefix)
                .and_then(|r| r.strip_prefix('/'))
                .unwrap_or(raw)
        };
        sanitize_relative(Path::new(rest))
    }
}

impl Handler for Hub {
    fn name(&self) -> &'static str {
        "hub"
    }

    /// Clients always signal the end of a message by half-closing
    fn framing(&self) -> Framing {
        Framing::HalfClose
    }

    fn handle(&self, conn: &mut Connection) -> Result<()> {
        let command = match conn.read_command_line().and_then(|line| {
            tracing::debug!("Received command from {}: {}", conn.peer_addr(), line);
            ClientCommand::parse(&line)
        }) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Rejected request from {}: {}", conn.peer_addr(), e);
                conn.send_error(e.client_message())?;
                return conn.close();
            }
        };

        if let Err(e) = self.execute(&command, conn) {
            if e.is_disconnect() {
                return Err(e);
            }
            tracing::warn!("{} from {} failed: {}", command.keyword(), conn.peer_addr(), e);
            conn.send_error(e.client_message())?;
        }

        match command {
            // Listing ends the conversation from the hub's side
            ClientCommand::Display { .. } => conn.close(),
            _ => conn.finish(),
        }
    }
}

/// Relative path rendered with `/` separators for the wire
fn wire_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
