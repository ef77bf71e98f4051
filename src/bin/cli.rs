//! shardfs CLI Client
//!
//! Issues one hub command per connection.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;

use clap::{Parser, Subcommand};
use shardfs::error::is_error_reply;
use shardfs::protocol::ClientCommand;
use shardfs::shard::{base_name, normalize_extension};
use shardfs::{Result, ShardError};
use tempfile::NamedTempFile;

/// Replies at most this long are checked against the hub's failure lines
const ERROR_REPLY_LIMIT: u64 = 128;

/// shardfs CLI
#[derive(Parser, Debug)]
#[command(name = "shardfs-cli")]
#[command(about = "CLI for the shardfs hub")]
struct Args {
    /// Hub address
    #[arg(short, long, default_value = "127.0.0.1:50501")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a local file
    Ufile {
        /// Local file to send
        filename: String,

        /// Destination such as ~smain/folder
        destination_path: String,
    },

    /// Download a file into the current directory
    Dfile {
        filename: String,
    },

    /// Delete a file
    Rmfile {
        filename: String,
    },

    /// Download a tar of every file of one type (.c, .txt, .pdf)
    Dtar {
        filetype: String,
    },

    /// List files across all shards
    Display {
        pathname: String,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args.server, args.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(server: &str, command: Commands) -> Result<()> {
    match command {
        Commands::Ufile { filename, destination_path } => {
            let mut file = File::open(&filename)?;
            let request = ClientCommand::Upload {
                file_name: filename.clone(),
                destination: destination_path,
            };
            let mut stream = send(server, &request, Some(&mut file))?;
            io::copy(&mut stream, &mut io::stdout())?;
        }
        Commands::Dfile { filename } => {
            let request = ClientCommand::Download { file_name: filename.clone() };
            let mut stream = send(server, &request, None)?;
            save_reply(&mut stream, Path::new(base_name(&filename)))?;
        }
        Commands::Rmfile { filename } => {
            let mut stream = send(server, &ClientCommand::Remove { file_name: filename }, None)?;
            io::copy(&mut stream, &mut io::stdout())?;
        }
        Commands::Dtar { filetype } => {
            let target = format!("{}files.tar", normalize_extension(&filetype));
            let request = ClientCommand::Archive { file_type: filetype };
            let mut stream = send(server, &request, None)?;
            save_reply(&mut stream, Path::new(&target))?;
        }
        Commands::Display { pathname } => {
            let mut stream = send(server, &ClientCommand::Display { path: pathname }, None)?;
            io::copy(&mut stream, &mut io::stdout())?;
        }
    }
    Ok(())
}

/// Write a download reply to `target`, or report it if the hub refused
///
/// The reply is staged beside `target`, so a failure line never replaces
/// an existing file.
fn save_reply(stream: &mut TcpStream, target: &Path) -> Result<()> {
    let mut head = Vec::new();
    (&mut *stream).take(ERROR_REPLY_LIMIT + 1).read_to_end(&mut head)?;
    if head.len() as u64 <= ERROR_REPLY_LIMIT && is_error_reply(&head) {
        eprint!("{}", String::from_utf8_lossy(&head));
        std::process::exit(1);
    }

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(&head)?;
    let bytes = head.len() as u64 + io::copy(stream, &mut staged)?;
    staged.persist(target).map_err(|e| ShardError::Io(e.error))?;

    println!("Downloaded {} bytes to {}", bytes, target.display());
    Ok(())
}

/// Connect, send the request (and body), half-close, return the stream
fn send(server: &str, request: &ClientCommand, body: Option<&mut File>) -> Result<TcpStream> {
    let mut stream = TcpStream::connect(server)?;
    stream.write_all(request.to_line().as_bytes())?;
    if let Some(body) = body {
        io::copy(body, &mut stream)?;
    }
    stream.shutdown(Shutdown::Write)?;
    Ok(stream)
}
