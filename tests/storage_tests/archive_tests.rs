//! Tests for the tar codec

use std::io::Cursor;

use shardfs::storage::{read_archive, ArchiveBuilder, EntryHeader, BLOCK_SIZE};
use shardfs::ShardError;

fn build(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = ArchiveBuilder::new(Vec::new());
    for (path, data) in entries {
        let header = EntryHeader::new(*path, data.len() as u64);
        builder.append(&header, &mut Cursor::new(data.to_vec())).unwrap();
    }
    builder.finish().unwrap()
}

#[test]
fn test_header_fields() {
    let header = EntryHeader {
        path: "docs/notes.txt".to_string(),
        size: 1234,
        mode: 0o640,
        mtime: 1_700_000_000,
    };
    let block = header.encode().unwrap();

    assert_eq!(&block[..14], b"docs/notes.txt");
    assert_eq!(block[14], 0);
    assert_eq!(&block[124..135], b"00000002322");
    assert_eq!(block[156], b'0');
    assert_eq!(&block[257..265], b"ustar\x0000");

    let decoded = EntryHeader::decode(&block).unwrap().unwrap();
    assert_eq!(decoded, header);
}

#[test]
fn test_long_path_uses_prefix_field() {
    let dir = "d".repeat(120);
    let path = format!("{}/{}.c", dir, "f".repeat(60));
    let block = EntryHeader::new(path.clone(), 0).encode().unwrap();

    assert_eq!(&block[345..465], dir.as_bytes());
    assert_eq!(EntryHeader::decode(&block).unwrap().unwrap().path, path);
}

#[test]
fn test_unsplittable_path_round_trips() {
    let path = format!("{}/{}.c", "d".repeat(200), "x".repeat(150));
    let header = EntryHeader::new(path.clone(), 3);
    assert!(header.needs_pax());

    let archive = build(&[(path.as_str(), &b"abc"[..]), ("short.c", &b"s"[..])]);
    let entries = read_archive(&mut Cursor::new(archive)).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].header.path, path);
    assert_eq!(entries[0].data, b"abc");
    assert_eq!(entries[1].header.path, "short.c");
}

#[test]
fn test_non_ascii_path_round_trips() {
    let archive = build(&[("notes/café.txt", &b"au lait"[..]), ("ok.txt", &b"ok"[..])]);

    // PAX header block and its record come first
    assert_eq!(archive[156], b'x');
    assert_eq!(&archive[BLOCK_SIZE..BLOCK_SIZE + 3], b"24 ");

    let entries = read_archive(&mut Cursor::new(archive)).unwrap();
    let paths: Vec<&str> = entries.iter().map(|e| e.header.path.as_str()).collect();
    assert_eq!(paths, vec!["notes/café.txt", "ok.txt"]);
    assert_eq!(entries[0].data, b"au lait");
}

#[test]
fn test_stand_in_header_is_plain_ascii() {
    let block = EntryHeader::new("dir/résumé.pdf", 1).encode().unwrap();
    let decoded = EntryHeader::decode(&block).unwrap().unwrap();
    assert_eq!(decoded.path, "r_sum_.pdf");
}

#[test]
fn test_empty_path_is_rejected() {
    assert!(matches!(
        EntryHeader::new("", 1).encode(),
        Err(ShardError::ArchiveBuild(_))
    ));
}

#[test]
fn test_tampered_header_fails_checksum() {
    let mut block = EntryHeader::new("a.txt", 5).encode().unwrap();
    block[0] = b'b';

    assert!(matches!(
        EntryHeader::decode(&block),
        Err(ShardError::Protocol(_))
    ));
}

#[test]
fn test_empty_archive_is_two_zero_blocks() {
    let archive = build(&[]);
    assert_eq!(archive, vec![0u8; BLOCK_SIZE * 2]);
}

#[test]
fn test_entries_are_block_aligned() {
    let archive = build(&[("a.txt", &b"hello"[..]), ("b.txt", &[7u8; BLOCK_SIZE][..])]);

    // header + padded data, header + exact block, end marker
    assert_eq!(archive.len(), BLOCK_SIZE * 2 + BLOCK_SIZE * 2 + BLOCK_SIZE * 2);
    assert!(archive[BLOCK_SIZE + 5..BLOCK_SIZE * 2].iter().all(|&b| b == 0));
}

#[test]
fn test_read_back_entries() {
    let archive = build(&[
        ("one.c", &b"int one;"[..]),
        ("sub/two.c", &b""[..]),
        ("three.c", &b"3"[..]),
    ]);

    let entries = read_archive(&mut Cursor::new(archive)).unwrap();
    let paths: Vec<&str> = entries.iter().map(|e| e.header.path.as_str()).collect();

    assert_eq!(paths, vec!["one.c", "sub/two.c", "three.c"]);
    assert_eq!(entries[0].data, b"int one;");
    assert!(entries[1].data.is_empty());
}

#[test]
fn test_append_detects_short_source() {
    let mut builder = ArchiveBuilder::new(Vec::new());
    let header = EntryHeader::new("short.txt", 100);

    let result = builder.append(&header, &mut Cursor::new(vec![1u8; 40]));
    assert!(matches!(result, Err(ShardError::ArchiveBuild(_))));
    assert_eq!(builder.entry_count(), 0);
}

#[test]
fn test_truncated_archive_fails_to_read() {
    let archive = build(&[("a.txt", &b"hello world"[..])]);
    let truncated = archive[..BLOCK_SIZE + 4].to_vec();

    assert!(read_archive(&mut Cursor::new(truncated)).is_err());
}
