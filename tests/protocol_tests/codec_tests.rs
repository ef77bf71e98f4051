//! Codec Tests
//!
//! Tests for request line reading and frame encoding/decoding.

use std::io::{BufReader, Cursor, Read};

use shardfs::protocol::{
    decode_frame, encode_frame, read_frame, read_line, write_frame, Frame, Status, HEADER_SIZE,
    MAX_COMMAND_LEN, MAX_FRAME_PAYLOAD, TRAILER_SIZE,
};
use shardfs::ShardError;

// =============================================================================
// Request Line Tests
// =============================================================================

#[test]
fn test_read_line_leaves_body_in_reader() {
    let mut reader = BufReader::new(Cursor::new(b"ufile a.c ~smain\nint main() {}\n".to_vec()));

    let line = read_line(&mut reader).unwrap();
    assert_eq!(line, "ufile a.c ~smain");

    let mut body = Vec::new();
    reader.read_to_end(&mut body).unwrap();
    assert_eq!(body, b"int main() {}\n");
}

#[test]
fn test_read_line_without_newline_ends_at_eof() {
    let mut reader = BufReader::new(Cursor::new(b"RETRIEVE notes.txt".to_vec()));
    assert_eq!(read_line(&mut reader).unwrap(), "RETRIEVE notes.txt");
}

#[test]
fn test_read_line_strips_carriage_return() {
    let mut reader = BufReader::new(Cursor::new(b"LIST\r\n".to_vec()));
    assert_eq!(read_line(&mut reader).unwrap(), "LIST");
}

#[test]
fn test_read_line_empty_stream_is_malformed() {
    let mut reader = BufReader::new(Cursor::new(Vec::new()));
    assert!(matches!(
        read_line(&mut reader),
        Err(ShardError::MalformedCommand(_))
    ));
}

#[test]
fn test_read_line_rejects_oversized_line() {
    let mut raw = vec![b'a'; MAX_COMMAND_LEN + 10];
    raw.push(b'\n');
    let mut reader = BufReader::new(Cursor::new(raw));

    assert!(matches!(
        read_line(&mut reader),
        Err(ShardError::CommandTooLong { .. })
    ));
}

#[test]
fn test_read_line_accepts_line_at_bound() {
    let mut raw = vec![b'a'; MAX_COMMAND_LEN];
    raw.push(b'\n');
    let mut reader = BufReader::new(Cursor::new(raw));

    assert_eq!(read_line(&mut reader).unwrap().len(), MAX_COMMAND_LEN);
}

#[test]
fn test_read_line_rejects_invalid_utf8() {
    let mut reader = BufReader::new(Cursor::new(vec![0xff, 0xfe, b'\n']));
    assert!(matches!(
        read_line(&mut reader),
        Err(ShardError::MalformedCommand(_))
    ));
}

// =============================================================================
// Frame Tests
// =============================================================================

#[test]
fn test_encode_frame_layout() {
    let encoded = encode_frame(&Frame::data(b"hello".to_vec()));

    assert_eq!(encoded.len(), HEADER_SIZE + 5 + TRAILER_SIZE);
    assert_eq!(encoded[0], Status::Data as u8);
    assert_eq!(&encoded[1..5], &5u32.to_be_bytes());
    assert_eq!(&encoded[5..10], b"hello");
    assert_eq!(&encoded[10..], &crc32fast::hash(b"hello").to_be_bytes());
}

#[test]
fn test_decode_error_and_end_frames() {
    let error = decode_frame(&encode_frame(&Frame::error("File not found.\n"))).unwrap();
    assert_eq!(error.status, Status::Error);
    assert_eq!(&error.payload[..], b"File not found.\n");

    let end = decode_frame(&encode_frame(&Frame::end())).unwrap();
    assert!(end.is_end());
    assert!(end.payload.is_empty());
}

#[test]
fn test_decode_detects_corruption() {
    let mut encoded = encode_frame(&Frame::data(b"payload".to_vec()));
    encoded[HEADER_SIZE + 2] ^= 0x40;

    match decode_frame(&encoded) {
        Err(ShardError::Protocol(msg)) => assert!(msg.contains("checksum")),
        other => panic!("Expected checksum error, got {:?}", other),
    }
}

#[test]
fn test_decode_unknown_status() {
    let mut encoded = encode_frame(&Frame::data(b"x".to_vec()));
    encoded[0] = 0x7f;
    assert!(matches!(decode_frame(&encoded), Err(ShardError::Protocol(_))));
}

#[test]
fn test_decode_rejects_oversized_length() {
    let mut header = vec![Status::Data as u8];
    header.extend_from_slice(&((MAX_FRAME_PAYLOAD + 1) as u32).to_be_bytes());
    header.extend_from_slice(&[0u8; 8]);

    assert!(matches!(decode_frame(&header), Err(ShardError::Protocol(_))));
}

#[test]
fn test_decode_rejects_end_with_payload() {
    let mut encoded = encode_frame(&Frame::data(b"oops".to_vec()));
    encoded[0] = Status::End as u8;
    assert!(matches!(decode_frame(&encoded), Err(ShardError::Protocol(_))));
}

#[test]
fn test_decode_incomplete() {
    let encoded = encode_frame(&Frame::data(b"truncated".to_vec()));
    assert!(decode_frame(&encoded[..3]).is_err());
    assert!(decode_frame(&encoded[..encoded.len() - 1]).is_err());
}

#[test]
fn test_stream_frames_in_sequence() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, &Frame::data(b"LIST\n".to_vec())).unwrap();
    write_frame(&mut buffer, &Frame::data(Vec::<u8>::new())).unwrap();
    write_frame(&mut buffer, &Frame::end()).unwrap();

    let mut cursor = Cursor::new(buffer);
    let first = read_frame(&mut cursor).unwrap();
    assert_eq!(&first.payload[..], b"LIST\n");

    let empty = read_frame(&mut cursor).unwrap();
    assert_eq!(empty.status, Status::Data);
    assert!(empty.payload.is_empty());

    assert!(read_frame(&mut cursor).unwrap().is_end());
    assert!(read_frame(&mut cursor).is_err());
}
