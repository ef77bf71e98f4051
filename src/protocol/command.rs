//! Command definitions
//!
//! Parsed request lines for both links:
//! - [`ClientCommand`]: what a client sends to the hub
//! - [`NodeCommand`]: what the hub sends to a storage node
//!
//! Parsing is whitespace tokenization with an exact arity per keyword and a
//! hard bound on every token. Oversized tokens are rejected, never truncated.

use crate::error::{Result, ShardError};

/// Maximum length of a single name/path token (bytes)
pub const MAX_NAME_LEN: usize = 1023;

/// A request from a client to the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `ufile <file_name> <destination>`; the file body follows the line
    Upload { file_name: String, destination: String },

    /// `dfile <file_name>`
    Download { file_name: String },

    /// `rmfile <file_name>`
    Remove { file_name: String },

    /// `dtar <file_type>`
    Archive { file_type: String },

    /// `display <path>`
    Display { path: String },
}

impl ClientCommand {
    /// Parse a request line
    pub fn parse(line: &str) -> Result<Self> {
        let tokens = tokenize(line)?;
        let (keyword, args) = tokens
            .split_first()
            .ok_or_else(|| ShardError::MalformedCommand("empty request".to_string()))?;

        match *keyword {
            "ufile" => {
                let [file_name, destination] = exact::<2>(keyword, args)?;
                Ok(ClientCommand::Upload {
                    file_name: file_name.to_string(),
                    destination: destination.to_string(),
                })
            }
            "dfile" => {
                let [file_name] = exact::<1>(keyword, args)?;
                Ok(ClientCommand::Download { file_name: file_name.to_string() })
            }
            "rmfile" => {
                let [file_name] = exact::<1>(keyword, args)?;
                Ok(ClientCommand::Remove { file_name: file_name.to_string() })
            }
            "dtar" => {
                let [file_type] = exact::<1>(keyword, args)?;
                Ok(ClientCommand::Archive { file_type: file_type.to_string() })
            }
            "display" => {
                let [path] = exact::<1>(keyword, args)?;
                Ok(ClientCommand::Display { path: path.to_string() })
            }
            other => Err(ShardError::UnsupportedCommand(other.to_string())),
        }
    }

    /// Render as a request line (newline-terminated)
    pub fn to_line(&self) -> String {
        match self {
            ClientCommand::Upload { file_name, destination } => {
                format!("ufile {} {}\n", file_name, destination)
            }
            ClientCommand::Download { file_name } => format!("dfile {}\n", file_name),
            ClientCommand::Remove { file_name } => format!("rmfile {}\n", file_name),
            ClientCommand::Archive { file_type } => format!("dtar {}\n", file_type),
            ClientCommand::Display { path } => format!("display {}\n", path),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            ClientCommand::Upload { .. } => "ufile",
            ClientCommand::Download { .. } => "dfile",
            ClientCommand::Remove { .. } => "rmfile",
            ClientCommand::Archive { .. } => "dtar",
            ClientCommand::Display { .. } => "display",
        }
    }
}

/// A request from the hub to a storage node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// `STORE <relative_path>`; the file body follows the line
    Store { path: String },

    /// `RETRIEVE <name>`
    Retrieve { name: String },

    /// `DELETE <name>`
    Delete { name: String },

    /// `ARCHIVE`
    Archive,

    /// `LIST`
    List,
}

impl NodeCommand {
    /// Parse a request line
    ///
    /// `dtar` and `display` are accepted as aliases of `ARCHIVE` and `LIST`
    /// with their single argument ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let tokens = tokenize(line)?;
        let (keyword, args) = tokens
            .split_first()
            .ok_or_else(|| ShardError::MalformedCommand("empty request".to_string()))?;

        match *keyword {
            "STORE" => {
                let [path] = exact::<1>(keyword, args)?;
                Ok(NodeCommand::Store { path: path.to_string() })
            }
            "RETRIEVE" => {
                let [name] = exact::<1>(keyword, args)?;
                Ok(NodeCommand::Retrieve { name: name.to_string() })
            }
            "DELETE" => {
                let [name] = exact::<1>(keyword, args)?;
                Ok(NodeCommand::Delete { name: name.to_string() })
            }
            "ARCHIVE" => {
                exact::<0>(keyword, args)?;
                Ok(NodeCommand::Archive)
            }
            "LIST" => {
                exact::<0>(keyword, args)?;
                Ok(NodeCommand::List)
            }
            "dtar" if args.len() <= 1 => Ok(NodeCommand::Archive),
            "display" if args.len() <= 1 => Ok(NodeCommand::List),
            other => Err(ShardError::UnsupportedCommand(other.to_string())),
        }
    }

    /// Render as a request line (newline-terminated)
    pub fn to_line(&self) -> String {
        match self {
            NodeCommand::Store { path } => format!("STORE {}\n", path),
            NodeCommand::Retrieve { name } => format!("RETRIEVE {}\n", name),
            NodeCommand::Delete { name } => format!("DELETE {}\n", name),
            NodeCommand::Archive => "ARCHIVE\n".to_string(),
            NodeCommand::List => "LIST\n".to_string(),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            NodeCommand::Store { .. } => "STORE",
            NodeCommand::Retrieve { .. } => "RETRIEVE",
            NodeCommand::Delete { .. } => "DELETE",
            NodeCommand::Archive => "ARCHIVE",
            NodeCommand::List => "LIST",
        }
    }

    /// Whether a body follows the request line
    pub fn has_body(&self) -> bool {
        matches!(self, NodeCommand::Store { .. })
    }
}

/// Split on ASCII whitespace, rejecting any token over [`MAX_NAME_LEN`]
fn tokenize(line: &str) -> Result<Vec<&str>> {
    let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
    if let Some(long) = tokens.iter().find(|t| t.len() > MAX_NAME_LEN) {
        return Err(ShardError::NameTooLong {
            len: long.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(tokens)
}

/// Require exactly `N` arguments after the keyword
fn exact<'a, const N: usize>(keyword: &str, args: &[&'a str]) -> Result<[&'a str; N]> {
    args.try_into().map_err(|_| {
        ShardError::MalformedCommand(format!(
            "{} expects {} argument(s), got {}",
            keyword,
            N,
            args.len()
        ))
    })
}
