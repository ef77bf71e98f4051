//! Error types for shardfs
//!
//! Provides a unified error type for hub, node and protocol operations.
//! Every variant maps to exactly one human-readable line that is sent back
//! over the connection (see [`ShardError::client_message`]).

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ShardError
pub type Result<T> = std::result::Result<T, ShardError>;

/// Unified error type for shardfs operations
#[derive(Debug, Error)]
pub enum ShardError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Routing Errors
    // -------------------------------------------------------------------------
    #[error("file has no extension: {0}")]
    NoExtension(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("unsupported archive type: {0}")]
    UnsupportedArchiveType(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("failed to create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to delete {path}: {source}")]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive build failed: {0}")]
    ArchiveBuild(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("failed to connect to storage node {addr}: {source}")]
    PeerConnect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server busy")]
    ServerBusy,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),

    #[error("name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("command line too long (max {max} bytes)")]
    CommandTooLong { max: usize },

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShardError {
    /// The single text line reported to the requester for this failure
    pub fn client_message(&self) -> &'static str {
        match self {
            ShardError::NoExtension(_) => "File has no extension.\n",
            ShardError::UnsupportedType(_) => "Unsupported file type.\n",
            ShardError::UnsupportedArchiveType(_) => {
                "Unsupported file type for archive creation.\n"
            }
            ShardError::FileNotFound(_) => "File not found.\n",
            ShardError::InvalidPath(_) => "Invalid path.\n",
            ShardError::DirectoryCreation { .. } => "Failed to create directory.\n",
            ShardError::DeleteFailed { .. } => "Failed to delete file.\n",
            ShardError::ArchiveBuild(_) => "Failed to create tar file.\n",
            ShardError::PeerConnect { .. } => "Failed to connect to storage node.\n",
            ShardError::ServerBusy => "Server busy.\n",
            ShardError::MalformedCommand(_)
            | ShardError::NameTooLong { .. }
            | ShardError::CommandTooLong { .. } => "Malformed command.\n",
            ShardError::UnsupportedCommand(_) => "Unsupported command received.\n",
            ShardError::Io(_) | ShardError::Protocol(_) | ShardError::Config(_) => {
                "Internal server error.\n"
            }
        }
    }

    /// Every line [`ShardError::client_message`] can produce
    pub const CLIENT_MESSAGES: [&'static str; 13] = [
        "File has no extension.\n",
        "Unsupported file type.\n",
        "Unsupported file type for archive creation.\n",
        "File not found.\n",
        "Invalid path.\n",
        "Failed to create directory.\n",
        "Failed to delete file.\n",
        "Failed to create tar file.\n",
        "Failed to connect to storage node.\n",
        "Server busy.\n",
        "Malformed command.\n",
        "Unsupported command received.\n",
        "Internal server error.\n",
    ];

    /// True when the peer went away, which is not worth a warning
    pub fn is_disconnect(&self) -> bool {
        match self {
            ShardError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// True when a whole reply is one of the hub's failure lines
///
/// Downloads answer with either the file's bytes or such a line, so a
/// client can tell them apart only by the complete reply.
pub fn is_error_reply(reply: &[u8]) -> bool {
    ShardError::CLIENT_MESSAGES
        .iter()
        .any(|message| reply == message.as_bytes())
}
