//! Tar Archive Codec
//!
//! Writes (and reads back) POSIX ustar archives, the format `tar -cf`
//! produces, so downloaded archives open with any standard tar tool.
//!
//! ## Layout
//! ```text
//! ┌──────────────┬────────────────────────────┐
//! │ Header (512) │ Data (padded to 512)       │  × entries
//! ├──────────────┴────────────────────────────┤
//! │ Two zero blocks (1024)                    │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Paths that are not ASCII or do not fit the 155-byte prefix plus 100-byte
//! name fields are carried in a PAX extended header (typeflag `x`, one
//! `path=` record) placed right before the entry. The entry's own header
//! then holds a shortened ASCII stand-in name.

use std::io::{self, Read, Write};

use crate::error::{Result, ShardError};

/// Tar block size
pub const BLOCK_SIZE: usize = 512;

/// Largest size an 11-digit octal field can hold (8 GiB - 1)
const MAX_ENTRY_SIZE: u64 = 0o77777777777;

const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;

/// Stand-in names are cut to this many characters
const FALLBACK_NAME_LEN: usize = 80;

// Field offsets within a header block
const MODE_OFFSET: usize = 100;
const UID_OFFSET: usize = 108;
const GID_OFFSET: usize = 116;
const SIZE_OFFSET: usize = 124;
const MTIME_OFFSET: usize = 136;
const CHECKSUM_OFFSET: usize = 148;
const TYPEFLAG_OFFSET: usize = 156;
const MAGIC_OFFSET: usize = 257;
const PREFIX_OFFSET: usize = 345;

// Typeflags
const TYPE_REGULAR: u8 = b'0';
const TYPE_PAX: u8 = b'x';
const TYPE_PAX_GLOBAL: u8 = b'g';

/// Metadata for one archived file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Path inside the archive, `/`-separated and relative
    pub path: String,
    pub size: u64,
    pub mode: u32,
    /// Seconds since the Unix epoch
    pub mtime: u64,
}

impl EntryHeader {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            mode: 0o644,
            mtime: 0,
        }
    }

    /// Encode as a 512-byte ustar header block
    ///
    /// When [`needs_pax`](Self::needs_pax) is true the block carries a
    /// stand-in name; [`ArchiveBuilder`] writes the full path ahead of it.
    pub fn encode(&self) -> Result<[u8; BLOCK_SIZE]> {
        if self.path.is_empty() {
            return Err(ShardError::ArchiveBuild("tar entry has an empty path".to_string()));
        }
        if self.size > MAX_ENTRY_SIZE {
            return Err(ShardError::ArchiveBuild(format!(
                "{} is too large for a tar entry ({} bytes)",
                self.path, self.size
            )));
        }

        let block = match split_path(&self.path) {
            Some((prefix, name)) => {
                header_block(prefix, name, TYPE_REGULAR, self.size, self.mode, self.mtime)
            }
            None => header_block(
                "",
                &fallback_name(&self.path),
                TYPE_REGULAR,
                self.size,
                self.mode,
                self.mtime,
            ),
        };
        Ok(block)
    }

    /// Whether the path must travel in a PAX `path` record
    pub fn needs_pax(&self) -> bool {
        !self.path.is_empty() && split_path(&self.path).is_none()
    }

    /// Decode a header block; `None` for an all-zero (end) block
    pub fn decode(block: &[u8; BLOCK_SIZE]) -> Result<Option<Self>> {
        Ok(decode_block(block)?.map(|(_, header)| header))
    }
}

/// Streams regular-file entries into a ustar archive
pub struct ArchiveBuilder<W: Write> {
    writer: W,
    entry_count: usize,
}

impl<W: Write> ArchiveBuilder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            entry_count: 0,
        }
    }

    /// Append one file; `data` must yield exactly `header.size` bytes
    pub fn append<R: Read>(&mut self, header: &EntryHeader, data: &mut R) -> Result<()> {
        let block = header.encode()?;

        if header.needs_pax() {
            let records = pax_record("path", &header.path);
            let pax_name = format!("PaxHeaders/{}", fallback_name(&header.path));
            let pax_header = header_block(
                "",
                &pax_name,
                TYPE_PAX,
                records.len() as u64,
                0o644,
                header.mtime,
            );
            self.writer.write_all(&pax_header)?;
            self.writer.write_all(records.as_bytes())?;
            self.pad(records.len() as u64)?;
        }

        self.writer.write_all(&block)?;

        let copied = io::copy(&mut data.take(header.size), &mut self.writer)?;
        if copied != header.size {
            return Err(ShardError::ArchiveBuild(format!(
                "{} shrank while archiving: expected {} bytes, read {}",
                header.path, header.size, copied
            )));
        }
        self.pad(header.size)?;

        self.entry_count += 1;
        Ok(())
    }

    fn pad(&mut self, size: u64) -> Result<()> {
        let padding = padding_for(size);
        if padding > 0 {
            self.writer.write_all(&[0u8; BLOCK_SIZE][..padding])?;
        }
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Write the end-of-archive marker and return the inner writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.write_all(&[0u8; BLOCK_SIZE * 2])?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// One entry read back from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub header: EntryHeader,
    pub data: Vec<u8>,
}

/// Read every entry of an archive into memory
///
/// PAX `path` records replace the stand-in name of the entry that follows.
pub fn read_archive<R: Read>(reader: &mut R) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    let mut block = [0u8; BLOCK_SIZE];
    let mut pax_path = None;

    loop {
        reader.read_exact(&mut block)?;
        let (typeflag, mut header) = match decode_block(&block)? {
            Some(decoded) => decoded,
            None => break,
        };

        let mut data = vec![0u8; header.size as usize];
        reader.read_exact(&mut data)?;

        let padding = padding_for(header.size);
        if padding > 0 {
            reader.read_exact(&mut block[..padding])?;
        }

        match typeflag {
            TYPE_PAX => pax_path = parse_pax_path(&data)?,
            TYPE_PAX_GLOBAL => {}
            _ => {
                if let Some(path) = pax_path.take() {
                    header.path = path;
                }
                entries.push(ArchiveEntry { header, data });
            }
        }
    }

    Ok(entries)
}

/// Verify the checksum and decode a header block with its typeflag
fn decode_block(block: &[u8; BLOCK_SIZE]) -> Result<Option<(u8, EntryHeader)>> {
    if block.iter().all(|&b| b == 0) {
        return Ok(None);
    }

    let stored = parse_octal(&block[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8])?;
    let actual: u64 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            if (CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8).contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(b)
            }
        })
        .sum();
    if stored != actual {
        return Err(ShardError::Protocol(format!(
            "tar header checksum mismatch: stored {}, computed {}",
            stored, actual
        )));
    }

    let name = c_str(&block[..NAME_LEN]);
    let prefix = c_str(&block[PREFIX_OFFSET..PREFIX_OFFSET + PREFIX_LEN]);
    let path = if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    };

    let header = EntryHeader {
        path,
        size: parse_octal(&block[SIZE_OFFSET..SIZE_OFFSET + 12])?,
        mode: parse_octal(&block[MODE_OFFSET..MODE_OFFSET + 8])? as u32,
        mtime: parse_octal(&block[MTIME_OFFSET..MTIME_OFFSET + 12])?,
    };
    Ok(Some((block[TYPEFLAG_OFFSET], header)))
}

/// Build a header block; the path fields must already fit
fn header_block(prefix: &str, name: &str, typeflag: u8, size: u64, mode: u32, mtime: u64) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];

    block[..name.len()].copy_from_slice(name.as_bytes());
    write_octal(&mut block[MODE_OFFSET..MODE_OFFSET + 8], u64::from(mode & 0o7777));
    write_octal(&mut block[UID_OFFSET..UID_OFFSET + 8], 0);
    write_octal(&mut block[GID_OFFSET..GID_OFFSET + 8], 0);
    write_octal(&mut block[SIZE_OFFSET..SIZE_OFFSET + 12], size);
    write_octal(&mut block[MTIME_OFFSET..MTIME_OFFSET + 12], mtime.min(MAX_ENTRY_SIZE));
    block[TYPEFLAG_OFFSET] = typeflag;
    block[MAGIC_OFFSET..MAGIC_OFFSET + 8].copy_from_slice(b"ustar\x0000");
    block[PREFIX_OFFSET..PREFIX_OFFSET + prefix.len()].copy_from_slice(prefix.as_bytes());

    // Checksum is computed with its own field filled with spaces
    block[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].copy_from_slice(b"        ");
    let checksum: u32 = block.iter().map(|&b| u32::from(b)).sum();
    let digits = format!("{:06o}\0 ", checksum);
    block[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].copy_from_slice(digits.as_bytes());

    block
}

/// One PAX record: `<len> <key>=<value>\n`, where `<len>` counts itself
fn pax_record(key: &str, value: &str) -> String {
    let body = key.len() + value.len() + 3;
    let mut len = body + 1;
    while len != body + len.to_string().len() {
        len = body + len.to_string().len();
    }
    format!("{} {}={}\n", len, key, value)
}

/// The `path` value of a PAX extended header, if present
fn parse_pax_path(mut data: &[u8]) -> Result<Option<String>> {
    let malformed = || ShardError::Protocol("malformed PAX extended header".to_string());
    let mut path = None;

    while !data.is_empty() {
        let space = data.iter().position(|&b| b == b' ').ok_or_else(malformed)?;
        let len: usize = std::str::from_utf8(&data[..space])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(malformed)?;
        if len <= space + 1 || len > data.len() || data[len - 1] != b'\n' {
            return Err(malformed());
        }

        if let Some(value) = data[space + 1..len - 1].strip_prefix(b"path=") {
            path = Some(String::from_utf8_lossy(value).into_owned());
        }
        data = &data[len..];
    }

    Ok(path)
}

/// ASCII stand-in for a path that needs a PAX record
fn fallback_name(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    let name: String = base
        .chars()
        .map(|c| if c.is_ascii() && c != '\0' { c } else { '_' })
        .take(FALLBACK_NAME_LEN)
        .collect();
    if name.is_empty() {
        "entry".to_string()
    } else {
        name
    }
}

/// Bytes of zero padding after `size` bytes of data
fn padding_for(size: u64) -> usize {
    let rem = (size % BLOCK_SIZE as u64) as usize;
    if rem == 0 {
        0
    } else {
        BLOCK_SIZE - rem
    }
}

/// Split a path into (prefix, name) so both fit their ustar fields
///
/// `None` when the path is not ASCII or has no usable split point.
fn split_path(path: &str) -> Option<(&str, &str)> {
    if path.is_empty() || !path.is_ascii() {
        return None;
    }
    if path.len() <= NAME_LEN {
        return Some(("", path));
    }

    // Split at the right-most '/' that leaves both halves in bounds
    path.match_indices('/')
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > 0 && idx <= PREFIX_LEN && path.len() - idx - 1 <= NAME_LEN)
        .last()
        .map(|idx| (&path[..idx], &path[idx + 1..]))
}

/// Zero-padded octal followed by a NUL, filling `field`
fn write_octal(field: &mut [u8], value: u64) {
    let width = field.len() - 1;
    let digits = format!("{:0width$o}", value, width = width);
    field[..width].copy_from_slice(digits.as_bytes());
    field[width] = 0;
}

fn parse_octal(field: &[u8]) -> Result<u64> {
    let text = c_str(field);
    let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
    if text.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(text, 8)
        .map_err(|_| ShardError::Protocol(format!("bad octal field in tar header: {:?}", text)))
}

fn c_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
