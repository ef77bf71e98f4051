//! Storage Module
//!
//! Local-disk persistence for one shard.
//!
//! ## Responsibilities
//! - Persist uploads under the shard root (staged, then renamed)
//! - Locate, stream and delete files by relative path or base name
//! - Enumerate managed files (one extension per shard)
//! - Build transient tar archives with unique names
//!
//! ## Layout
//! ```text
//! {root}/
//!   ├── a.txt
//!   ├── notes/
//!   │     └── b.txt
//!   └── .shardfs-staging/
//!         └── .upload-XXXX.part   (in-flight upload, invisible)
//!
//! {staging}/txtfiles-XXXX.tar  (transient archive, deleted on drop)
//! ```

mod archive;
mod store;

pub use archive::{read_archive, ArchiveBuilder, ArchiveEntry, EntryHeader, BLOCK_SIZE};
pub use store::{sanitize_relative, ShardStore, STAGING_DIR};
