//! Shard Table
//!
//! Static mapping from file extension to the node that owns it.
//!
//! ## Resolution Rule
//! - Extension is the text after the last `.` of the file's base name
//! - No `.` (or nothing after it) is a missing-extension error
//! - An extension with no entry in the table is an unsupported-type error
//!
//! The table is ordered; listings and fan-out follow that order.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, ShardError};

/// Where a shard's files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// On the hub's own disk
    Local,

    /// On a storage node reachable at `host:port`
    Remote(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local => write!(f, "local"),
            Location::Remote(addr) => write!(f, "{}", addr),
        }
    }
}

/// A single extension → location binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// Extension without the leading dot (e.g. `txt`)
    pub extension: String,
    pub location: Location,
}

impl Shard {
    pub fn local(extension: &str) -> Self {
        Self {
            extension: normalize_extension(extension).to_string(),
            location: Location::Local,
        }
    }

    pub fn remote(extension: &str, addr: impl Into<String>) -> Self {
        Self {
            extension: normalize_extension(extension).to_string(),
            location: Location::Remote(addr.into()),
        }
    }

    pub fn is_local(&self) -> bool {
        self.location == Location::Local
    }
}

/// Parses `ext=local` or `ext=host:port`
impl FromStr for Shard {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        let (ext, location) = s
            .split_once('=')
            .ok_or_else(|| ShardError::Config(format!("shard '{}' is not ext=location", s)))?;

        let ext = normalize_extension(ext.trim());
        let location = location.trim();
        if ext.is_empty() || location.is_empty() {
            return Err(ShardError::Config(format!("shard '{}' is incomplete", s)));
        }

        if location.eq_ignore_ascii_case("local") {
            Ok(Shard::local(ext))
        } else {
            Ok(Shard::remote(ext, location))
        }
    }
}

/// Ordered, immutable extension → location table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTable {
    shards: Vec<Shard>,
}

impl ShardTable {
    /// Build a table, validating that:
    /// - exactly one shard is local
    /// - no extension appears twice
    pub fn new(shards: Vec<Shard>) -> Result<Self> {
        let local_count = shards.iter().filter(|s| s.is_local()).count();
        if local_count != 1 {
            return Err(ShardError::Config(format!(
                "shard table needs exactly one local shard, found {}",
                local_count
            )));
        }

        for (i, shard) in shards.iter().enumerate() {
            if shard.extension.is_empty() {
                return Err(ShardError::Config("empty extension in shard table".to_string()));
            }
            if shards[..i].iter().any(|s| s.extension == shard.extension) {
                return Err(ShardError::Config(format!(
                    "extension '{}' is bound twice",
                    shard.extension
                )));
            }
        }

        Ok(Self { shards })
    }

    /// Resolve the shard owning `file_name` by its extension
    pub fn resolve(&self, file_name: &str) -> Result<&Shard> {
        let ext = extension_of(file_name)?;
        self.lookup(ext)
            .ok_or_else(|| ShardError::UnsupportedType(file_name.to_string()))
    }

    /// Find the shard bound to an extension (leading dot optional)
    pub fn lookup(&self, extension: &str) -> Option<&Shard> {
        let ext = normalize_extension(extension);
        self.shards.iter().find(|s| s.extension == ext)
    }

    /// The hub's own shard
    pub fn local(&self) -> &Shard {
        // `new` guarantees exactly one local shard
        self.shards
            .iter()
            .find(|s| s.is_local())
            .unwrap_or(&self.shards[0])
    }

    /// Remote shards in table order
    pub fn remotes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.shards.iter().filter_map(|s| match &s.location {
            Location::Remote(addr) => Some((s.extension.as_str(), addr.as_str())),
            Location::Local => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shard> {
        self.shards.iter()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

impl Default for ShardTable {
    /// `c` on the hub, `pdf` and `txt` on their own nodes
    fn default() -> Self {
        Self {
            shards: vec![
                Shard::local("c"),
                Shard::remote("pdf", "127.0.0.1:50503"),
                Shard::remote("txt", "127.0.0.1:50502"),
            ],
        }
    }
}

/// Extension of a file name: the text after the last `.` of its base name
pub fn extension_of(file_name: &str) -> Result<&str> {
    let base = base_name(file_name);
    match base.rfind('.') {
        Some(idx) if idx + 1 < base.len() => Ok(&base[idx + 1..]),
        _ => Err(ShardError::NoExtension(file_name.to_string())),
    }
}

/// Last path component of a name, or the name itself
pub fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}

/// Strip a single leading dot: `.txt` → `txt`
pub fn normalize_extension(ext: &str) -> &str {
    ext.strip_prefix('.').unwrap_or(ext)
}
