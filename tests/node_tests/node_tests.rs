//! Storage Node Tests
//!
//! Drives a live node over TCP in both framings.

#[path = "../common/mod.rs"]
mod common;

use std::io::{Cursor, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use shardfs::network::{Connection, NodeClient};
use shardfs::protocol::NodeCommand;
use shardfs::storage::read_archive;
use shardfs::{Framing, NodeConfig, StorageNode};
use tempfile::TempDir;

use common::{count_files, payload, start, start_node, Running};

const FRAMINGS: [Framing; 2] = [Framing::HalfClose, Framing::LengthPrefixed];

fn setup(framing: Framing) -> (TempDir, Running, NodeClient) {
    let temp_dir = TempDir::new().unwrap();
    let node = start_node(
        &temp_dir.path().join("stext"),
        &temp_dir.path().join("staging"),
        "txt",
        framing,
    );
    let client = NodeClient::new(node.addr.to_string(), framing).with_timeouts(2000, 10_000, 10_000);
    (temp_dir, node, client)
}

fn store(client: &NodeClient, path: &str, content: &[u8]) -> String {
    let mut body = Cursor::new(content.to_vec());
    let mut reply = Vec::new();
    client
        .relay(
            &NodeCommand::Store { path: path.to_string() },
            Some(&mut body as &mut dyn Read),
            &mut reply,
        )
        .unwrap();
    String::from_utf8(reply).unwrap()
}

fn fetch_text(client: &NodeClient, command: NodeCommand) -> (String, bool) {
    let (bytes, relayed) = client.fetch(&command).unwrap();
    (String::from_utf8(bytes).unwrap(), relayed.remote_error)
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_store_and_retrieve() {
    for framing in FRAMINGS {
        let (temp, _node, client) = setup(framing);
        let content = payload(150_000);

        assert_eq!(store(&client, "docs/big.txt", &content), "File uploaded successfully.\n");
        assert_eq!(
            std::fs::read(temp.path().join("stext/docs/big.txt")).unwrap(),
            content
        );

        let (bytes, relayed) = client
            .fetch(&NodeCommand::Retrieve { name: "docs/big.txt".to_string() })
            .unwrap();
        assert_eq!(bytes, content, "{} retrieve", framing);
        assert_eq!(relayed.bytes, content.len() as u64);
        assert!(!relayed.remote_error);
    }
}

#[test]
fn test_retrieve_by_base_name() {
    for framing in FRAMINGS {
        let (_temp, _node, client) = setup(framing);
        store(&client, "a/b/deep.txt", b"deep");

        let (text, _) = fetch_text(&client, NodeCommand::Retrieve { name: "deep.txt".to_string() });
        assert_eq!(text, "deep");
    }
}

#[test]
fn test_retrieve_missing_file() {
    for framing in FRAMINGS {
        let (_temp, _node, client) = setup(framing);

        let (text, remote_error) =
            fetch_text(&client, NodeCommand::Retrieve { name: "ghost.txt".to_string() });
        assert_eq!(text, "File not found.\n");
        assert_eq!(remote_error, framing == Framing::LengthPrefixed);
    }
}

#[test]
fn test_delete() {
    for framing in FRAMINGS {
        let (temp, _node, client) = setup(framing);
        store(&client, "x.txt", b"x");
        store(&client, "y.txt", b"y");

        let (text, _) = fetch_text(&client, NodeCommand::Delete { name: "x.txt".to_string() });
        assert_eq!(text, "File deleted successfully.\n");
        assert!(!temp.path().join("stext/x.txt").exists());
        assert!(temp.path().join("stext/y.txt").exists());

        let (text, _) = fetch_text(&client, NodeCommand::Delete { name: "x.txt".to_string() });
        assert_eq!(text, "Failed to delete file.\n");
    }
}

#[test]
fn test_list() {
    for framing in FRAMINGS {
        let (temp, _node, client) = setup(framing);
        store(&client, "b.txt", b"");
        store(&client, "sub/a.txt", b"");
        std::fs::write(temp.path().join("stext/stray.pdf"), b"").unwrap();

        let (text, _) = fetch_text(&client, NodeCommand::List);
        assert_eq!(text, "a.txt\nb.txt\n");
    }
}

#[test]
fn test_list_empty_shard() {
    for framing in FRAMINGS {
        let (_temp, _node, client) = setup(framing);
        let (text, remote_error) = fetch_text(&client, NodeCommand::List);
        assert!(text.is_empty());
        assert!(!remote_error);
    }
}

// =============================================================================
// Rejections
// =============================================================================

fn raw_request(framing: Framing, addr: &str, line: &str) -> Vec<u8> {
    let mut conn = Connection::connect(addr, framing, 2000).unwrap();
    conn.set_timeouts(10_000, 10_000).unwrap();
    conn.write_command_line(line).unwrap();
    conn.finish_request(false).unwrap();

    let mut response = Vec::new();
    conn.read_to_end(&mut response).unwrap();
    response
}

#[test]
fn test_unsupported_command() {
    for framing in FRAMINGS {
        let (_temp, node, _client) = setup(framing);

        let response = raw_request(framing, &node.addr.to_string(), "FROB x.txt\n");
        assert_eq!(response, b"Unsupported command received.\n");
    }
}

#[test]
fn test_malformed_command() {
    for framing in FRAMINGS {
        let (_temp, node, _client) = setup(framing);

        let response = raw_request(framing, &node.addr.to_string(), "RETRIEVE\n");
        assert_eq!(response, b"Malformed command.\n");
    }
}

#[test]
fn test_legacy_aliases() {
    let (_temp, node, client) = setup(Framing::HalfClose);
    store(&client, "n.txt", b"n");

    let response = common::request_text(node.addr, "display\n");
    assert_eq!(response, "n.txt\n");
}

#[test]
fn test_store_rejects_traversal() {
    for framing in FRAMINGS {
        let (temp, _node, client) = setup(framing);

        let reply = store(&client, "../outside.txt", b"nope");
        assert_eq!(reply, "Invalid path.\n");
        assert!(!temp.path().join("outside.txt").exists());
    }
}

#[test]
fn test_server_busy() {
    let temp_dir = TempDir::new().unwrap();
    let config = NodeConfig::builder()
        .storage_root(temp_dir.path().join("stext"))
        .extension("txt")
        .build();
    let node = start(Arc::new(StorageNode::open(config).unwrap()), common::loopback(0));

    let mut stream = TcpStream::connect(node.addr).unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    assert_eq!(response, "Server busy.\n");
}

#[test]
fn test_server_busy_over_framed_link() {
    let temp_dir = TempDir::new().unwrap();
    let config = NodeConfig::builder()
        .storage_root(temp_dir.path().join("stext"))
        .extension("txt")
        .framing(Framing::LengthPrefixed)
        .build();
    let node = start(Arc::new(StorageNode::open(config).unwrap()), common::loopback(0));

    let client = NodeClient::new(node.addr.to_string(), Framing::LengthPrefixed)
        .with_timeouts(2000, 10_000, 10_000);
    let (text, remote_error) = fetch_text(&client, NodeCommand::List);
    assert_eq!(text, "Server busy.\n");
    assert!(remote_error);
}

// =============================================================================
// Archives
// =============================================================================

#[test]
fn test_archive_contents() {
    for framing in FRAMINGS {
        let (_temp, _node, client) = setup(framing);
        store(&client, "one.txt", b"first");
        store(&client, "nested/two.txt", &payload(70_000));

        let (bytes, relayed) = client.fetch(&NodeCommand::Archive).unwrap();
        assert!(!relayed.remote_error);

        let entries = read_archive(&mut Cursor::new(bytes)).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.header.path.as_str()).collect();
        assert_eq!(paths, vec!["nested/two.txt", "one.txt"]);
        assert_eq!(entries[0].data, payload(70_000));
    }
}

#[test]
fn test_concurrent_archives_are_independent() {
    for framing in FRAMINGS {
        let (temp, _node, client) = setup(framing);
        for i in 0..8 {
            store(&client, &format!("f{}.txt", i), &payload(10_000 + i));
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let client = client.clone();
                thread::spawn(move || client.fetch(&NodeCommand::Archive).unwrap().0)
            })
            .collect();

        for handle in handles {
            let entries = read_archive(&mut Cursor::new(handle.join().unwrap())).unwrap();
            assert_eq!(entries.len(), 8);
            for entry in &entries {
                let i: usize = entry.header.path[1..entry.header.path.len() - 4].parse().unwrap();
                assert_eq!(entry.data, payload(10_000 + i));
            }
        }

        // Archives are gone once their response has been sent
        assert_eq!(count_files(&temp.path().join("staging")), 0);
    }
}
